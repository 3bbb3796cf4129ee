use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use nxtspp_client::ClientError;

use crate::cmd::link::Link;
use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_bytes, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let poll_interval = parse_duration(&args.poll_interval)?;
    let link = Link::open(&args.connect)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut received = 0usize;
    while running.load(Ordering::SeqCst) {
        let available = match link.manager().available() {
            Ok(available) => available,
            Err(ClientError::NotConnected) => return Err(connection_lost(&link)),
            Err(err) => return Err(client_error("read failed", err)),
        };
        if available == 0 {
            thread::sleep(poll_interval);
            continue;
        }

        let wanted = match args.count {
            Some(count) => available.min(count.saturating_sub(received)),
            None => available,
        };
        let bytes = link
            .manager()
            .read(wanted)
            .map_err(|err| client_error("read failed", err))?;
        print_bytes(&bytes, format);
        received = received.saturating_add(bytes.len());

        if args.count.is_some_and(|count| received >= count) {
            break;
        }
    }

    link.close();
    Ok(SUCCESS)
}

fn connection_lost(link: &Link) -> CliError {
    let reason = link
        .failure()
        .unwrap_or_else(|| "connection closed".to_string());
    CliError::new(TRANSPORT_ERROR, format!("connection lost: {reason}"))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
