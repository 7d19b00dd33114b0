mod common;

use common::harvest_cmd;

fn help_output(args: &[&str]) -> String {
    let assert = harvest_cmd().args(args).assert().success();
    String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 help")
}

#[test]
fn top_level_help_lists_commands() {
    let output = help_output(&["--help"]);
    for command in ["fetch", "get", "scan"] {
        assert!(output.contains(command), "{command} missing from help: {output}");
    }
}

#[test]
fn fetch_help_shows_usage() {
    let output = help_output(&["fetch", "--help"]);
    assert!(
        output.contains("harvest fetch <DIRECTORY> [--workers N] [--limit START:STOP] [--days 30|365]"),
        "fetch usage missing: {output}"
    );
}

#[test]
fn unknown_window_is_rejected_by_the_parser() {
    harvest_cmd()
        .args(["fetch", ".", "--days", "7"])
        .assert()
        .failure()
        .code(2);
}
