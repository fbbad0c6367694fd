use std::{fs::File, io::BufWriter, path::Path, sync::mpsc::Receiver};

use log::{error, info};
use serde_jsonlines::JsonLinesWriter;

use crate::{HelmsmanError, dashboard::DashboardFrame};

/// Record every frame received on the channel as one JSON line, until all
/// senders are dropped.
pub fn write_frames(
    file: &Path,
    frame_receiver: Receiver<DashboardFrame>,
) -> Result<(), HelmsmanError> {
    let frame_file = File::create(file).map_err(|e| HelmsmanError::WriterError { source: e })?;
    let mut frame_writer = JsonLinesWriter::new(BufWriter::new(frame_file));

    let mut written = 0usize;
    for frame in &frame_receiver {
        match frame_writer.write(&frame) {
            Ok(()) => written += 1,
            Err(e) => error!("Error while writing frame {} to output file: {}", frame.cycle, e),
        }
    }
    frame_writer
        .flush()
        .map_err(|e| HelmsmanError::WriterError { source: e })?;
    info!("Wrote {} frames to {:?}", written, file);
    Ok(())
}
