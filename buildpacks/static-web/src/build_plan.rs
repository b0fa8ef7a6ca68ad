use crate::config::Capabilities;
use crate::layout::AppLayout;
use libcnb::data::build_plan::{BuildPlan, BuildPlanBuilder, Require};
use toml::value::Table;

/// Requirements this buildpack places on the build for the given layout.
///
/// Every layout needs a web server at launch and the static file capability. Apps that have to
/// be built also need the build tool to run before this buildpack's build phase, since the
/// document root only exists afterwards.
pub(crate) fn build_plan(layout: &AppLayout, capabilities: &Capabilities) -> BuildPlan {
    let mut builder = BuildPlanBuilder::new()
        .requires(require(
            &capabilities.web_server,
            [("launch", toml::Value::Boolean(true))],
        ))
        .requires(require(
            &capabilities.static_files,
            [("layout", toml::Value::String(layout.name().to_string()))],
        ));

    if let AppLayout::BuiltOutput { output_dir } = layout {
        builder = builder.requires(require(
            &capabilities.build_tool,
            [
                ("build", toml::Value::Boolean(true)),
                (
                    "output_dir",
                    toml::Value::String(output_dir.to_string_lossy().to_string()),
                ),
            ],
        ));
    }

    builder.build()
}

fn require<const N: usize>(name: &str, metadata: [(&str, toml::Value); N]) -> Require {
    let mut require = Require::new(name);
    require.metadata = metadata
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect::<Table>();
    require
}
