use clap::Parser;

use super::{Cli, CliCommand};

#[test]
fn parses_add_with_options() {
    let cli = Cli::try_parse_from([
        "dqr",
        "add",
        "123",
        "/music/song.mp3",
        "--url",
        "https://cdn.example.com/song.mp3",
        "--quality",
        "9",
        "--title",
        "Song",
    ])
    .unwrap();
    match cli.command {
        CliCommand::Add {
            source_id,
            target,
            url,
            quality,
            title,
        } => {
            assert_eq!(source_id, "123");
            assert_eq!(target, "/music/song.mp3");
            assert_eq!(url, "https://cdn.example.com/song.mp3");
            assert_eq!(quality, 9);
            assert_eq!(title.as_deref(), Some("Song"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn add_requires_a_url() {
    assert!(Cli::try_parse_from(["dqr", "add", "123", "/music/song.mp3"]).is_err());
}

#[test]
fn add_defaults_quality() {
    let cli = Cli::try_parse_from(["dqr", "add", "123", "/x", "--url", "https://e/x"]).unwrap();
    match cli.command {
        CliCommand::Add { quality, title, .. } => {
            assert_eq!(quality, 3);
            assert!(title.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_bare_subcommands() {
    assert!(matches!(
        Cli::try_parse_from(["dqr", "run"]).unwrap().command,
        CliCommand::Run
    ));
    assert!(matches!(
        Cli::try_parse_from(["dqr", "status"]).unwrap().command,
        CliCommand::Status
    ));
    assert!(matches!(
        Cli::try_parse_from(["dqr", "clear"]).unwrap().command,
        CliCommand::Clear
    ));
    assert!(matches!(
        Cli::try_parse_from(["dqr", "retry"]).unwrap().command,
        CliCommand::Retry
    ));
}

#[test]
fn remove_takes_a_numeric_id() {
    let cli = Cli::try_parse_from(["dqr", "remove", "7"]).unwrap();
    assert!(matches!(cli.command, CliCommand::Remove { id: 7 }));
    assert!(Cli::try_parse_from(["dqr", "remove", "seven"]).is_err());
    assert!(Cli::try_parse_from(["dqr", "remove"]).is_err());
}
