use std::env::args;

use anyhow::Result;
use clap::Parser;
use unlockcount::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::multi_thread_runtime,
    },
};

fn main() -> Result<()> {
    run_service(args().collect::<Vec<_>>())
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);

    if !args.force {
        #[cfg(unix)]
        {
            use daemonize::Daemonize;

            // The application directory has to be resolved before the working directory changes.
            let args = DaemonArgs {
                dir: Some(resolve_dir(&args)?),
                ..args
            };
            let daemonize = Daemonize::new()
                .stdout(daemonize::Stdio::devnull())
                .stderr(daemonize::Stdio::devnull())
                .execute();
            match daemonize {
                daemonize::Outcome::Parent(parent) => {
                    parent.inspect_err(|e| eprintln!("Failed to create daemon {e:?}"))?;
                    println!("Created daemon");
                    return Ok(());
                }
                daemonize::Outcome::Child(child) => {
                    child?;
                    return run(args);
                }
            }
        }
    }

    run(args)
}

fn resolve_dir(args: &DaemonArgs) -> Result<std::path::PathBuf> {
    match &args.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Ok(std::path::absolute(dir)?)
        }
        None => create_application_default_path(),
    }
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = resolve_dir(&args)?;
    enable_logging(DAEMON_PREFIX, &app_dir, args.log, args.log_console)?;
    multi_thread_runtime()?.block_on(async move { start_daemon(&app_dir).await })?;
    Ok(())
}
