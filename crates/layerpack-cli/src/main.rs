use atty::Stream;
use clap::Parser;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

mod cli;
mod dispatch;
mod output;
mod style;

use cli::LayerpackCli;
use output::CommandOutcome;
use style::{Status, Style};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = LayerpackCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet || cli.json);

    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));
    let command = dispatch::command_name(&cli.command);
    let outcome = CommandOutcome::from_result(dispatch::execute(&cli.command), &style);
    emit_output(&cli, &style, command, &outcome)?;

    if outcome.code == 0 {
        Ok(())
    } else {
        std::process::exit(outcome.code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = ["layerpack", "layerpack_core", "layerpack_domain", "layerpack_cli"]
            .map(|target| format!("{target}={level}"))
            .join(",");
        EnvFilter::new(directives)
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(
    cli: &LayerpackCli,
    style: &Style,
    command: &str,
    outcome: &CommandOutcome,
) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome.to_json(command))?);
        return Ok(());
    }

    match outcome.status {
        Status::Ok => {
            if cli.quiet {
                return Ok(());
            }
            println!("{}", style.status(Status::Ok, &outcome.message));
            for line in &outcome.body {
                println!("{line}");
            }
        }
        Status::Failure => {
            eprintln!("{}", style.status(Status::Failure, &format!("Error: {}", outcome.message)));
            if let Some(hint) = outcome.hint() {
                eprintln!("{}", style.info(&format!("Hint: {hint}")));
            }
        }
    }
    Ok(())
}
