//! CLI `context` command: suggest a context size for a GGUF model.

use anyhow::{ensure, Result};
use std::path::Path;

use crate::context_size::{estimate_context, model_size, KvParams};

const MIB: u64 = 1024 * 1024;

/// Print the suggested context size to stdout; the working is on stderr so
/// the number can be captured by scripts.
pub fn context(model: &Path, vram_mib: u64, params: KvParams) -> Result<()> {
    ensure!(vram_mib > 0, "no VRAM given; pass --vram-mib");
    let vram_bytes = vram_mib * MIB;
    let model_bytes = model_size(model)?;

    eprintln!("VRAM:        {:.2} GB", vram_bytes as f64 / 1e9);
    eprintln!("Model size:  {:.2} GB", model_bytes as f64 / 1e9);
    eprintln!(
        "KV cache:    {:.4} MB/token",
        params.bytes_per_token()? / MIB as f64
    );

    let ctx = estimate_context(vram_bytes, model_bytes, &params)?;
    println!("{ctx}");
    Ok(())
}
