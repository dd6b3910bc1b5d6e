use anyhow::Context;
use sitekeeper_core::{io, secret_payload};
use std::io::Read;
use std::path::Path;

/// Turn a deployment secret payload into an env file. `-` reads stdin.
pub fn run(secret: &Path, out: Option<&Path>) -> anyhow::Result<()> {
    let raw = if secret == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read secret payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(secret)
            .with_context(|| format!("failed to read secret payload {}", secret.display()))?
    };

    let content = secret_payload::render_env(&raw)?;
    match out {
        Some(path) => {
            io::atomic_write_private(path, content.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "env file written");
        }
        None => print!("{content}"),
    }
    Ok(())
}
