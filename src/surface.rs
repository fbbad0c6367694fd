// Publish seam between the poll loop and whatever renders the dashboard

use std::sync::mpsc::Sender;

use log::{debug, info};

use crate::{HelmsmanError, dashboard::DashboardFrame};

/// Something that displays or records dashboard frames.
///
/// The poll loop computes a complete frame first and then hands it to the
/// surface in a single call, so surfaces never observe a half-built cycle.
pub trait RenderSurface {
    fn publish(&mut self, frame: &DashboardFrame) -> Result<(), HelmsmanError>;
}

impl RenderSurface for Vec<Box<dyn RenderSurface>> {
    fn publish(&mut self, frame: &DashboardFrame) -> Result<(), HelmsmanError> {
        let mut first_error = None;
        // every surface gets the frame even if an earlier one fails
        for surface in self.iter_mut() {
            if let Err(e) = surface.publish(frame) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Writes a short summary of every frame to the log.
#[derive(Default)]
pub struct LogSurface {
    skipping: bool,
}

impl RenderSurface for LogSurface {
    fn publish(&mut self, frame: &DashboardFrame) -> Result<(), HelmsmanError> {
        let arena = frame
            .info
            .as_ref()
            .map(|info| info.arena.as_str())
            .unwrap_or("-");
        let position = frame
            .log_table
            .last()
            .map(|row| row.coordinate.as_str())
            .unwrap_or("-");

        if frame.is_fresh() {
            info!(
                "[{}] {} | {} log rows | latest {}",
                arena,
                frame.folder_id.as_deref().unwrap_or("-"),
                frame.log_table.len(),
                position
            );
        } else if !self.skipping {
            info!("[{}] cycle {} skipped, showing last known picture", arena, frame.cycle);
        }
        if let Some(geotag) = &frame.vessel_geotag {
            debug!("{}", geotag);
        }

        self.skipping = !frame.is_fresh();
        Ok(())
    }
}

/// Forwards frames over a channel to a consumer thread, such as the frame writer.
pub struct ChannelSurface {
    sender: Sender<DashboardFrame>,
}

impl ChannelSurface {
    pub fn new(sender: Sender<DashboardFrame>) -> Self {
        Self { sender }
    }
}

impl RenderSurface for ChannelSurface {
    fn publish(&mut self, frame: &DashboardFrame) -> Result<(), HelmsmanError> {
        self.sender.send(frame.clone())?;
        Ok(())
    }
}
