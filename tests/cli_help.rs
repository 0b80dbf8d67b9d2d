use clap::CommandFactory;
use speed_sweep::cli::Args;

#[test]
fn cli_definition_is_consistent() {
    Args::command().debug_assert();
}

#[test]
fn every_subcommand_has_help_text() {
    let cmd = Args::command();
    let subs: Vec<_> = cmd
        .get_subcommands()
        .filter(|s| s.get_name() != "help")
        .collect();
    let names: Vec<&str> = subs.iter().map(|s| s.get_name()).collect();
    assert_eq!(names, ["start", "cancel", "run-chunk", "worker", "status"]);
    for sub in subs {
        assert!(sub.get_about().is_some(), "{} has no help text", sub.get_name());
    }
}
