use anyhow::Result;
use reconcile::{DiffOptions, compute_live_diff};

use crate::Context;
use crate::cli::DiffArgs;
use crate::commands::Project;
use crate::config::ProjectConfig;
use crate::render;
use crate::ui;

pub async fn run(ctx: &Context, args: DiffArgs) -> Result<()> {
    let project = Project::load(ctx)?;
    let manifest = project.manifest()?;
    let requester = project.connect()?;
    let options = diff_options(&project.config, &args);

    if !args.json && !ctx.quiet {
        ui::header("Site Diff");
        ui::kv("Site", requester.base_url());
        ui::kv("Manifest", &project.config.manifest_path(&project.root).display().to_string());
    }

    let (diff, _live) = compute_live_diff(&manifest, &requester, options).await?;

    if args.json {
        return ui::print_json(&diff);
    }
    render::display_diff(&diff);
    Ok(())
}

fn diff_options(config: &ProjectConfig, args: &DiffArgs) -> DiffOptions {
    let mut options = config.diff_options();
    options.strict_mode |= args.strict;
    if args.no_plugins {
        options.include_plugins = false;
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let config = ProjectConfig::default();
        let args = DiffArgs {
            strict: true,
            no_plugins: true,
            json: false,
        };
        let options = diff_options(&config, &args);
        assert!(options.strict_mode);
        assert!(!options.include_plugins);

        let args = DiffArgs {
            strict: false,
            no_plugins: false,
            json: false,
        };
        assert_eq!(diff_options(&config, &args), config.diff_options());
    }
}
