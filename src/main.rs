use std::path::{Path, PathBuf};
use std::sync::Arc;

use jira_dump::config::{self, AppConfigOverrides};
use jira_dump::export::{self, ExportError};
use jira_dump::jira::JiraClient;
use jira_dump::logging;
use jira_dump::metrics::Metrics;
use jira_dump::progress::with_progress;
use jira_dump::{DumpSession, Dumper, OutputRow};

fn export_view<I>(dir: &Path, name: &str, rows: I) -> Result<(), ExportError>
where
    I: Iterator<Item = OutputRow>,
{
    let path = dir.join(format!("{name}.csv"));
    let written = export::write_csv(&path, with_progress(name, rows))?;
    logging::info(format!("wrote {} rows to {}", written, path.display()));
    Ok(())
}

fn export_fetched_view<I>(dir: &Path, name: &str, rows: I) -> Result<(), ExportError>
where
    I: Iterator<Item = Result<OutputRow, jira_dump::jira::JiraError>>,
{
    let path = dir.join(format!("{name}.csv"));
    let written = export::try_write_csv(&path, with_progress(name, rows))?;
    logging::info(format!("wrote {} rows to {}", written, path.display()));
    Ok(())
}

fn export_session(
    session: &DumpSession<JiraClient>,
    dir: &Path,
    worklogs: bool,
    sla_overview: bool,
) -> Result<(), ExportError> {
    let profile = session.profile();
    export_view(dir, "issues", session.issues())?;
    if profile.transitions {
        export_view(dir, "transitions", session.transitions())?;
    }
    if profile.comments {
        export_view(dir, "comments", session.comments())?;
    }
    if profile.fix_versions {
        export_view(dir, "fix_versions", session.fix_versions())?;
    }
    if worklogs {
        export_fetched_view(dir, "worklogs", session.worklogs())?;
    }
    if sla_overview {
        export_fetched_view(dir, "sla_overview", session.sla_overview())?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args_os();
    let _program = args.next();
    let mut cfg = match args.next() {
        Some(path) => config::load_from(&PathBuf::from(path))?,
        None => config::load()?,
    };
    cfg.apply_overrides(&AppConfigOverrides::from_env())?;
    if cfg.logging.debug {
        logging::enable_debug();
    }

    let metrics = Arc::new(Metrics::new());
    let jira = JiraClient::new_with_metrics(
        cfg.jira.base_url.clone(),
        cfg.auth(),
        Arc::clone(&metrics),
    )?;
    logging::info(format!(
        "starting jira-dump base_url={} auth={:?}",
        jira.base_url, jira.auth
    ));

    let output_dir = PathBuf::from(&cfg.dump.output_dir);
    export::ensure_dir(&output_dir)?;

    let session = Dumper::new(jira, cfg.jira.jql.clone(), cfg.profile()).open()?;
    let result = export_session(
        &session,
        &output_dir,
        cfg.dump.worklogs,
        cfg.dump.sla_overview,
    );
    session.close();
    metrics.log_summary();

    if let Err(err) = result {
        logging::error(format!("export failed: {err}"));
        return Err(err.into());
    }
    Ok(())
}
