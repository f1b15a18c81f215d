use std::process::Command;

use tracing::info;

use psb_core::{errors::Error, ports::ProcessControl, Result};

/// Replaces the running process with a fresh copy of itself, same arguments.
pub struct ExecRestarter;

impl ProcessControl for ExecRestarter {
    fn restart(&self) -> Result<()> {
        let exe = std::env::current_exe()
            .map_err(|e| Error::External(format!("cannot locate executable: {e}")))?;
        let args: Vec<String> = std::env::args().skip(1).collect();
        info!(exe = %exe.display(), "re-executing");

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Only returns on failure.
            let err = Command::new(&exe).args(&args).exec();
            Err(Error::External(format!("exec failed: {err}")))
        }

        #[cfg(not(unix))]
        {
            Command::new(&exe)
                .args(&args)
                .spawn()
                .map_err(|e| Error::External(format!("respawn failed: {e}")))?;
            std::process::exit(0)
        }
    }
}
