use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use selene::conditions::{has_text, hidden, visible};
use selene::{config, Browser};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("selene")
        .about("Open a page and wait for an element to reach a state")
        .arg(Arg::new("url").required(true).help("Page to open"))
        .arg(
            Arg::new("element")
                .long("element")
                .short('e')
                .value_name("CSS")
                .help("Element to wait for"),
        )
        .arg(
            Arg::new("text")
                .long("text")
                .value_name("TEXT")
                .requires("element")
                .help("Wait until the element's text contains TEXT"),
        )
        .arg(
            Arg::new("hidden")
                .long("hidden")
                .action(ArgAction::SetTrue)
                .requires("element")
                .conflicts_with("text")
                .help("Wait until the element is hidden instead of visible"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .short('t')
                .value_name("SECONDS")
                .value_parser(value_parser!(f64))
                .help("Wait timeout, overriding SELENE_TIMEOUT"),
        )
        .arg(
            Arg::new("headless")
                .long("headless")
                .action(ArgAction::SetTrue)
                .help("Run the browser without a window"),
        )
        .arg(
            Arg::new("screenshot")
                .long("screenshot")
                .value_name("NAME")
                .help("Save a screenshot named NAME once done"),
        )
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run() {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    config::reload_from_env().context("invalid SELENE_* environment")?;
    config::update(|config| {
        if matches.get_flag("headless") {
            config.headless = true;
        }
        if let Some(seconds) = matches.get_one::<f64>("timeout") {
            config.timeout = Duration::from_secs_f64(seconds.max(0.0));
        }
    })?;

    let browser = selene::browser();
    let result = drive(&browser, &matches);
    if let Err(err) = browser.quit() {
        error!("failed to quit browser: {}", err);
    }
    result
}

fn drive(browser: &Browser, matches: &clap::ArgMatches) -> anyhow::Result<()> {
    let url = matches
        .get_one::<String>("url")
        .context("url is required")?;
    browser.open(url)?;
    info!("opened {} ({})", browser.current_url()?, browser.title()?);

    if let Some(css) = matches.get_one::<String>("element") {
        let element = browser.element(css.as_str());
        if matches.get_flag("hidden") {
            element.should(hidden())?;
            info!("{} is hidden", css);
        } else if let Some(text) = matches.get_one::<String>("text") {
            element.should(has_text(text.as_str()))?;
            info!("{} has text '{}'", css, text);
        } else {
            element.should(visible())?;
            info!("{} is visible: '{}'", css, element.text()?);
        }
    }

    if let Some(name) = matches.get_one::<String>("screenshot") {
        let path = browser.screenshot(name)?;
        info!("screenshot saved to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn test_text_and_hidden_conflict() {
        let result = cli().try_get_matches_from([
            "selene",
            "http://app.test",
            "--element",
            "#a",
            "--text",
            "x",
            "--hidden",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_timeout_parses_fractional_seconds() {
        let matches = cli()
            .try_get_matches_from(["selene", "http://app.test", "--timeout", "1.5"])
            .unwrap();
        assert_eq!(matches.get_one::<f64>("timeout"), Some(&1.5));
    }
}
