use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use anyhow::Context;

/// Raw received payloads, concatenated without any framing or formatting (useful e.g. for
///  MPEG-TS streams)
pub struct BinaryDump {
    out: BufWriter<File>,
}

impl BinaryDump {
    pub fn create(path: &Path) -> anyhow::Result<BinaryDump> {
        let file = File::create(path)
            .with_context(|| format!("open dump file {:?}", path))?;
        Ok(BinaryDump { out: BufWriter::new(file) })
    }

    pub fn append(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        self.out.write_all(payload)
            .context("write to dump file")?;
        self.out.flush()
            .context("write to dump file")?;
        Ok(())
    }
}
