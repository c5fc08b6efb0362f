use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use mod_serverquery::ServerQueryConnector;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};
use tsmunin_core::{
    Catalog, Credentials, DEFAULT_HOST, DEFAULT_PORT, Plugin, PluginConfig, parse_instance_ids,
};
use tsmunin_sdk::Connector;

// Ensure the graph catalog is linked so its groups register.
use mod_graphs as _;

/// Read by munin-node-configure.
const MAGIC_MARKERS: &str = "#%# family=manual\n#%# capabilities=autoconf";

#[derive(Parser, Debug)]
#[command(
    name = "teamspeak_multi",
    version,
    about = "Munin multigraph plugin for TeamSpeak 3 virtual servers",
    after_help = MAGIC_MARKERS
)]
struct Cli {
    /// Munin plugin command (`config` or `autoconf`); without one, current
    /// values are printed. Other commands produce no output.
    #[arg(value_parser = parse_mode)]
    mode: Option<Mode>,

    /// ServerQuery host
    #[arg(long, env = "host", default_value = DEFAULT_HOST)]
    host: String,

    /// ServerQuery port
    #[arg(long, env = "port", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Comma separated virtual server ids
    #[arg(long = "id", env = "id", default_value = "1")]
    ids: String,

    /// ServerQuery login name
    #[arg(long, env = "username")]
    username: Option<String>,

    /// ServerQuery password
    #[arg(long, env = "password", hide_env_values = true)]
    password: Option<String>,

    /// Label series with virtual server names instead of ids
    #[arg(
        long,
        env = "resolve_names",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    resolve_names: bool,

    /// Connect/read/write timeout in seconds
    #[arg(
        long,
        env = "timeout",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    #[arg(long, env = "MUNIN_CAP_DIRTYCONFIG", hide = true)]
    dirty_config: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Mode {
    Config,
    Autoconf,
    /// Commands such as `suggest` that this plugin does not implement.
    Unsupported(String),
}

fn parse_mode(raw: &str) -> Result<Mode, std::convert::Infallible> {
    Ok(match raw {
        "config" => Mode::Config,
        "autoconf" => Mode::Autoconf,
        other => Mode::Unsupported(other.to_string()),
    })
}

impl Cli {
    fn plugin_config(&self) -> PluginConfig {
        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                Some(Credentials::new(username.clone(), password.clone()))
            }
            _ => None,
        };

        PluginConfig {
            host: self.host.clone(),
            port: self.port,
            instances: parse_instance_ids(&self.ids),
            credentials,
            resolve_names: self.resolve_names,
        }
    }

    fn dirty_config(&self) -> bool {
        self.dirty_config.as_deref() == Some("1")
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TSMUNIN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false)
                .with_filter(filter),
        )
        .init();
}

/// Produces the complete output before writing any of it.
fn run<C: Connector, W: Write>(cli: &Cli, connector: C, out: &mut W) -> Result<()> {
    let plugin = Plugin::new(cli.plugin_config(), Catalog::registered(), connector);

    let report = match &cli.mode {
        Some(Mode::Autoconf) => {
            writeln!(out, "{}", plugin.autoconf())?;
            return Ok(());
        }
        Some(Mode::Unsupported(command)) => {
            debug!(%command, "ignoring unsupported plugin command");
            return Ok(());
        }
        Some(Mode::Config) if cli.dirty_config() => plugin.dirty_config_report()?,
        Some(Mode::Config) => plugin.config_report()?,
        None => plugin.data_report()?,
    };

    out.write_all(report.to_text()?.as_bytes())?;
    out.flush()?;
    Ok(())
}

fn report_failure<W: Write>(error: &anyhow::Error, err: &mut W) {
    // Nothing sensible is left to do if stderr is gone.
    let _ = writeln!(err, "error: {:#}", error);
}

/// Process exit status for the outcome of [`run`].
fn finish<W: Write>(result: Result<()>, err: &mut W) -> u8 {
    match result {
        Ok(()) => 0,
        Err(error) => {
            report_failure(&error, err);
            1
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    debug!(mode = ?cli.mode, ids = %cli.ids, host = %cli.host, "plugin invoked");
    let connector = ServerQueryConnector::new(Duration::from_secs(cli.timeout));

    let stdout = io::stdout();
    let mut handle = BufWriter::new(stdout.lock());

    let result = run(&cli, connector, &mut handle);
    ExitCode::from(finish(result, &mut io::stderr()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use tsmunin_core::testing::{MockConnector, sample_stats};

    fn parse(args: &[&str]) -> Cli {
        let argv = std::iter::once("teamspeak_multi").chain(args.iter().copied());
        Cli::try_parse_from(argv).expect("valid arguments")
    }

    fn run_to_string(cli: &Cli, connector: MockConnector) -> (Result<()>, String) {
        let mut out: Vec<u8> = Vec::new();
        let result = run(cli, connector, &mut out);
        (result, String::from_utf8(out).expect("utf-8 output"))
    }

    #[test]
    fn parses_munin_commands() {
        assert_eq!(parse(&["config"]).mode, Some(Mode::Config));
        assert_eq!(parse(&["autoconf"]).mode, Some(Mode::Autoconf));
        assert_eq!(parse(&[]).mode, None);
        assert_eq!(
            parse(&["suggest"]).mode,
            Some(Mode::Unsupported("suggest".to_string()))
        );
    }

    #[test]
    fn unsupported_command_prints_nothing_and_succeeds() {
        let connector = MockConnector::new().unreachable();
        let cli = parse(&["suggest", "--username", "a", "--password", "b"]);

        let (result, output) = run_to_string(&cli, connector.clone());
        assert_eq!(output, "");
        assert!(connector.calls().is_empty());

        let mut stderr: Vec<u8> = Vec::new();
        assert_eq!(finish(result, &mut stderr), 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let argv = ["teamspeak_multi", "--timeout", "0"];
        assert!(Cli::try_parse_from(argv).is_err());
        assert_eq!(parse(&["--timeout", "3"]).timeout, 3);
    }

    #[test]
    fn arguments_become_plugin_config() {
        let cli = parse(&[
            "--host", "ts.example", "--port", "10022", "--id", "3,x,1", "--username", "a",
            "--password", "b", "--resolve-names", "no",
        ]);
        let config = cli.plugin_config();
        assert_eq!(config.host, "ts.example");
        assert_eq!(config.port, 10022);
        assert_eq!(config.instances, parse_instance_ids("3,1"));
        assert_eq!(config.credentials, Some(Credentials::new("a", "b")));
        assert!(!config.resolve_names);
    }

    #[test]
    fn credentials_need_both_parts() {
        let cli = parse(&["--username", "a"]);
        assert!(cli.plugin_config().credentials.is_none());
    }

    #[test]
    fn fetch_prints_every_group_for_every_instance() {
        let connector = MockConnector::new()
            .with_stats(1, sample_stats(12, 2))
            .with_stats(2, sample_stats(5, 1));
        let cli = parse(&["--id", "1,2", "--username", "a", "--password", "b"]);

        let (result, output) = run_to_string(&cli, connector);
        result.unwrap();

        let markers: Vec<_> = output
            .lines()
            .filter(|line| line.starts_with("multigraph "))
            .collect();
        assert_eq!(
            markers,
            vec![
                "multigraph teamspeak_transfer",
                "multigraph teamspeak_fttransfer",
                "multigraph teamspeak_uptime",
                "multigraph teamspeak_usercount",
                "multigraph teamspeak_ping",
                "multigraph teamspeak_pktloss",
            ]
        );
        assert!(output.starts_with(
            "multigraph teamspeak_transfer\ndown_1.value 1048576\nup_1.value 2097152\ndown_2.value 1048576\nup_2.value 2097152\n"
        ));
        assert!(output.contains("user_1.value 10\nqueryuser_1.value 2\nuser_2.value 4\n"));
    }

    #[test]
    fn rejected_login_prints_nothing() {
        let connector = MockConnector::new()
            .with_stats(1, sample_stats(1, 0))
            .rejecting_login("invalid loginname or password");
        let cli = parse(&["--username", "a", "--password", "wrong"]);

        let (result, output) = run_to_string(&cli, connector);
        assert_eq!(output, "");

        let mut stderr: Vec<u8> = Vec::new();
        assert_eq!(finish(result, &mut stderr), 1);
        let stderr = String::from_utf8(stderr).unwrap();
        assert_eq!(stderr.lines().count(), 1);
        assert_eq!(stderr, "error: Login failed: invalid loginname or password\n");
    }

    #[test]
    fn successful_run_exits_zero_without_stderr() {
        let connector = MockConnector::new().with_stats(1, sample_stats(3, 1));
        let cli = parse(&["--username", "a", "--password", "b"]);

        let (result, output) = run_to_string(&cli, connector);
        assert!(output.contains("user_1.value 2\n"));

        let mut stderr: Vec<u8> = Vec::new();
        assert_eq!(finish(result, &mut stderr), 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn autoconf_never_connects() {
        let connector = MockConnector::new().unreachable();

        let (result, output) = run_to_string(&parse(&["autoconf"]), connector.clone());
        result.unwrap();
        assert_eq!(output, "no (env variables are missing)\n");

        let cli = parse(&["autoconf", "--username", "a", "--password", "b"]);
        let (result, output) = run_to_string(&cli, connector.clone());
        result.unwrap();
        assert_eq!(output, "yes\n");
        assert!(connector.calls().is_empty());
    }

    #[test]
    fn dirty_config_prints_config_then_values() {
        let connector = MockConnector::new()
            .with_server(1, "Lobby")
            .with_stats(1, sample_stats(2, 0));
        let cli = parse(&[
            "config", "--username", "a", "--password", "b", "--dirty-config", "1",
        ]);

        let (result, output) = run_to_string(&cli, connector.clone());
        result.unwrap();

        let label = output.find("down_1.label Lobby").expect("config line");
        let value = output.find("down_1.value 1048576").expect("data line");
        assert!(label < value);
        assert_eq!(
            connector.calls(),
            vec![
                "connect localhost:10011",
                "login a",
                "serverlist",
                "use sid=1",
                "serverinfo",
                "quit",
            ]
        );
    }

    #[test]
    fn help_carries_munin_magic_markers() {
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("#%# family=manual"));
        assert!(help.contains("#%# capabilities=autoconf"));
    }
}
