mod command;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use link_core::config::{AdmissionPolicy, DEFAULT_COOLDOWN};
use session::{Bench, Session, SessionOptions, Transcript};

const USAGE: &str = "Usage: link-emulator [--policy <dedup|cooldown|both>] [--cooldown <ms>] \
                     [--loss <n>] [--transcript <path>]";

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let transcript = match options.transcript_path.as_deref() {
        Some(path) => Transcript::with_file(path)?,
        None => Transcript::in_memory(),
    };
    let mut line = String::new();

    writeln!(
        writer,
        "UWB Link Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    let bench = Bench::new();
    let mut session = Session::new(&bench, &options, transcript);

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options<I>(args: I) -> Result<SessionOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = SessionOptions::default();
    let mut policy = "dedup".to_string();
    let mut cooldown = DEFAULT_COOLDOWN;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--policy" => policy = value()?,
            "--cooldown" => {
                let millis = value()?;
                let millis: u64 = millis
                    .parse()
                    .map_err(|_| format!("Invalid cooldown `{millis}`"))?;
                cooldown = Duration::from_millis(millis);
            }
            "--loss" => {
                let every = value()?;
                options.loss_every = every
                    .parse()
                    .map_err(|_| format!("Invalid loss interval `{every}`"))?;
            }
            "--transcript" => options.transcript_path = Some(PathBuf::from(value()?)),
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    options.policy = match policy.to_ascii_lowercase().as_str() {
        "dedup" => AdmissionPolicy::Dedup,
        "cooldown" => AdmissionPolicy::Cooldown { window: cooldown },
        "both" => AdmissionPolicy::DedupThenCooldown { window: cooldown },
        other => return Err(format!("Unknown admission policy `{other}`")),
    };
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| (*arg).to_string()).collect()
    }

    #[test]
    fn defaults_to_dedup_without_loss() {
        let options = parse_options(Vec::new()).expect("defaults");
        assert_eq!(options.policy, AdmissionPolicy::Dedup);
        assert_eq!(options.loss_every, 0);
        assert!(options.transcript_path.is_none());
    }

    #[test]
    fn cooldown_window_applies_to_policy() {
        let options =
            parse_options(args(&["--policy=both", "--cooldown", "800", "--loss", "4"]))
                .expect("options");
        assert_eq!(
            options.policy,
            AdmissionPolicy::DedupThenCooldown {
                window: Duration::from_millis(800)
            }
        );
        assert_eq!(options.loss_every, 4);
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(parse_options(args(&["--policy", "random"])).is_err());
        assert!(parse_options(args(&["--loss"])).is_err());
        assert!(parse_options(args(&["--verbose"])).is_err());
    }
}
