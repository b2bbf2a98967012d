use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["scrapedeck-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
    assert!(cli.sites_file.is_none());
}

#[test]
fn parses_sites_command() {
    let cli = Cli::try_parse_from(["scrapedeck-cli", "sites"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Sites)));
}

#[test]
fn search_defaults_leave_limit_to_the_site() {
    let cli = Cli::try_parse_from(["scrapedeck-cli", "search", "amazon", "usb hub"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Search {
            ref site,
            ref term,
            limit: None,
            output_dir: None,
            no_save: false,
        }) if site == "amazon" && term == "usb hub"
    ));
}

#[test]
fn search_accepts_limit_and_its_aliases() {
    for flag in ["--limit", "--max-pages", "--max-results"] {
        let cli = Cli::try_parse_from(["scrapedeck-cli", "search", "wikipedia", "Rust", flag, "3"])
            .unwrap_or_else(|e| panic!("{flag} should parse: {e}"));
        assert!(
            matches!(cli.command, Some(Commands::Search { limit: Some(3), .. })),
            "{flag}"
        );
    }
}

#[test]
fn search_output_options() {
    let cli = Cli::try_parse_from([
        "scrapedeck-cli",
        "search",
        "jiomart",
        "rice",
        "--output-dir",
        "/tmp/out",
        "--no-save",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Search { output_dir: Some(ref dir), no_save: true, .. })
            if dir == &PathBuf::from("/tmp/out")
    ));
}

#[test]
fn sites_file_is_global() {
    let cli =
        Cli::try_parse_from(["scrapedeck-cli", "sites", "--sites-file", "custom.yaml"]).unwrap();
    assert_eq!(cli.sites_file, Some(PathBuf::from("custom.yaml")));
}

#[test]
fn search_requires_site_and_term() {
    assert!(Cli::try_parse_from(["scrapedeck-cli", "search", "amazon"]).is_err());
}

#[test]
fn non_numeric_limit_is_rejected() {
    let args = ["scrapedeck-cli", "search", "amazon", "tv", "--limit", "lots"];
    assert!(Cli::try_parse_from(args).is_err());
}
