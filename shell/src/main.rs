use argh::FromArgs;
use pipesh::{Interpreter, JobControl, ShellConfig};
use std::path::PathBuf;
use std::process;

#[derive(FromArgs)]
/// A small interactive shell with pipelines, redirections and && / || chains.
struct Args {
    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status
    command: Option<String>,

    #[argh(option)]
    /// history file; defaults to $HOME/.pipesh_history
    history: Option<PathBuf>,

    #[argh(switch)]
    /// do not load or save line history
    no_history: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("PIPESH_LOG", "warn"))
        .init();
    let args: Args = argh::from_env();

    let jobs = JobControl::install().unwrap_or_else(|err| {
        log::warn!("job control unavailable: {err}");
        JobControl::detached()
    });
    let mut sh = Interpreter::with_jobs(jobs);

    if let Some(line) = args.command {
        let code = match sh.run_line(&line) {
            Ok(_) => 0,
            Err(err) => {
                if !matches!(err, pipesh::Error::Exec(pipesh::ExecError::Failed(_))) {
                    eprintln!("pipesh: {err:#}");
                }
                err.exit_code()
            }
        };
        process::exit(code);
    }

    let config = ShellConfig::resolve(args.history, args.no_history, sh.env());
    match sh.repl(&config) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("pipesh: {err:#}");
            process::exit(1);
        }
    }
}
