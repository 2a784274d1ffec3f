use clap::Parser;
use std::path::PathBuf;
use waypoint::cli::commands::delivery::DeliveryCommands;
use waypoint::cli::commands::learn::{FailureCommands, LearnCommands};
use waypoint::cli::commands::spec::{SpecCommands, SpecWorktreeCommands};
use waypoint::cli::{Cli, Commands};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn test_parse_spec_start() {
    let cli = parse(&["waypoint", "spec", "start", "feat-1", "--plan", "plans/feat-1.md", "--variant", "extended"]);
    match cli.command {
        Commands::Spec(args) => match args.command {
            SpecCommands::Start { slug, plan, variant } => {
                assert_eq!(slug, "feat-1");
                assert_eq!(plan.as_deref(), Some("plans/feat-1.md"));
                assert_eq!(variant.as_deref(), Some("extended"));
            }
            other => panic!("Wrong spec command: {other:?}"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_spec_record_verdicts_requires_files() {
    assert!(Cli::try_parse_from(["waypoint", "spec", "record-verdicts"]).is_err());

    let cli = parse(&["waypoint", "spec", "record-verdicts", "r1.txt", "r2.json"]);
    match cli.command {
        Commands::Spec(args) => match args.command {
            SpecCommands::RecordVerdicts { files } => {
                assert_eq!(files, vec![PathBuf::from("r1.txt"), PathBuf::from("r2.json")]);
            }
            other => panic!("Wrong spec command: {other:?}"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_spec_worktree_attach_defaults_to_main() {
    let cli = parse(&["waypoint", "spec", "worktree", "attach"]);
    match cli.command {
        Commands::Spec(args) => match args.command {
            SpecCommands::Worktree(SpecWorktreeCommands::Attach { base }) => assert_eq!(base, "main"),
            other => panic!("Wrong spec command: {other:?}"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_delivery_skip() {
    let cli = parse(&["waypoint", "--session", "s9", "delivery", "skip", "--reason", "docs only"]);
    assert_eq!(cli.session, "s9");
    match cli.command {
        Commands::Delivery(args) => match args.command {
            DeliveryCommands::Skip { reason } => assert_eq!(reason, "docs only"),
            other => panic!("Wrong delivery command: {other:?}"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_learn_decide() {
    let id = uuid::Uuid::new_v4();
    let id_str = id.to_string();
    let cli = parse(&[
        "waypoint",
        "--json",
        "learn",
        "decide",
        &id_str,
        "accept",
        "--category",
        "lint",
    ]);
    assert!(cli.json);
    match cli.command {
        Commands::Learn(args) => match args.command {
            LearnCommands::Decide {
                id: parsed,
                decision,
                edited,
                category,
            } => {
                assert_eq!(parsed, id);
                assert_eq!(decision, "accept");
                assert!(edited.is_none());
                assert_eq!(category.as_deref(), Some("lint"));
            }
            other => panic!("Wrong learn command: {other:?}"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_learn_failure_count() {
    let cli = parse(&["waypoint", "learn", "failure", "count", "-c", "test", "--since-days", "7"]);
    match cli.command {
        Commands::Learn(args) => match args.command {
            LearnCommands::Failure(FailureCommands::Count {
                category,
                since_days,
                file,
            }) => {
                assert_eq!(category.as_deref(), Some("test"));
                assert_eq!(since_days, Some(7));
                assert!(file.is_none());
            }
            other => panic!("Wrong learn command: {other:?}"),
        },
        _ => panic!("Wrong top-level command"),
    }
}
