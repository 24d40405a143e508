use std::process::ExitCode;

fn main() -> ExitCode {
    match proxmox_node_source::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
