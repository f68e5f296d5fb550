use super::*;
use crate::harvest::{load_keywords, totals_for};
use wfpop_core::Platform;
use wfpop_harvest::RunSummary;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["wfpop-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["wfpop-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["wfpop-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_harvest_targets() {
    for (arg, expected) in [
        ("youtube", HarvestTarget::Youtube),
        ("forum", HarvestTarget::Forum),
        ("trends", HarvestTarget::Trends),
        ("all", HarvestTarget::All),
    ] {
        let cli = Cli::try_parse_from(["wfpop-cli", "harvest", arg]).expect("valid target");
        assert!(matches!(
            cli.command,
            Some(Commands::Harvest { target, dry_run: false }) if target == expected
        ));
    }
}

#[test]
fn parses_harvest_dry_run() {
    let cli = Cli::try_parse_from(["wfpop-cli", "harvest", "forum", "--dry-run"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Harvest {
            target: HarvestTarget::Forum,
            dry_run: true
        })
    ));
}

#[test]
fn rejects_unknown_harvest_target() {
    assert!(Cli::try_parse_from(["wfpop-cli", "harvest", "reddit"]).is_err());
    assert!(Cli::try_parse_from(["wfpop-cli", "harvest"]).is_err());
}

#[test]
fn all_target_covers_every_platform() {
    assert_eq!(
        HarvestTarget::All.platforms(),
        vec![Platform::Youtube, Platform::Forum, Platform::Google]
    );
    assert_eq!(HarvestTarget::Trends.platforms(), vec![Platform::Google]);
}

#[test]
fn missing_keyword_seed_falls_back_to_defaults() {
    let keywords = load_keywords(std::path::Path::new("/nonexistent/wfpop/seed.json"));
    assert_eq!(keywords, wfpop_core::default_keywords());
}

#[test]
fn empty_keyword_seed_falls_back_to_defaults() {
    let path = std::env::temp_dir().join(format!("wfpop-cli-empty-seed-{}.json", std::process::id()));
    std::fs::write(&path, "[]").expect("write seed");

    let keywords = load_keywords(&path);
    std::fs::remove_file(&path).ok();

    assert_eq!(keywords, wfpop_core::default_keywords());
}

#[test]
fn totals_are_taken_from_the_run_summary() {
    let summary = RunSummary {
        units_total: 6,
        units_committed: 5,
        units_failed: 1,
        units_throttled: 0,
        inserted: 9,
        updated: 4,
        cancelled: false,
    };

    let totals = totals_for(&summary);
    assert_eq!(totals.records_inserted, 9);
    assert_eq!(totals.records_updated, 4);
    assert_eq!(totals.units_failed, 1);
}
