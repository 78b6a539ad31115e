use std::sync::Arc;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    internals::core::{mailbox::PositionMailbox, ports::LocationSource},
    models::{location_reading::LocationReading, position_sample::PositionSample},
};

/// Which field of a position sample an axis steers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Column where the line crosses the horizontal middle of the image.
    #[default]
    #[display(fmt = "mid_line_cross")]
    MidLineCross,

    /// Image center shifted by the reported offset.
    #[display(fmt = "mid_offset")]
    MidOffset,
}

impl Projection {
    /// Turn a sample into a reading along the image width. Out-of-focus
    /// samples and samples without a usable width or crossing are not seen.
    pub fn project(&self, sample: &PositionSample, id: u64) -> LocationReading {
        if !sample.in_focus || sample.width <= 0 {
            return LocationReading::not_seen(id);
        }

        let position = match self {
            Projection::MidLineCross if sample.mid_line_cross < 0 => {
                return LocationReading::not_seen(id)
            }
            Projection::MidLineCross => sample.mid_line_cross,
            Projection::MidOffset => match (sample.width / 2).checked_add(sample.mid_offset) {
                Some(position) => position,
                None => return LocationReading::not_seen(id),
            },
        };

        LocationReading::new(position, sample.width, sample.middle_inc.max(0), id)
    }
}

/// Location source backed by a stream client's mailbox: blocks until the
/// next sample arrives and projects it. A closed mailbox reads as not seen.
pub struct MailboxLocationSource {
    mailbox: Arc<PositionMailbox>,
    projection: Projection,
}

impl MailboxLocationSource {
    pub fn new(mailbox: Arc<PositionMailbox>, projection: Projection) -> Self {
        Self {
            mailbox,
            projection,
        }
    }
}

impl LocationSource for MailboxLocationSource {
    fn read_location(&mut self) -> LocationReading {
        match self.mailbox.consume_numbered() {
            Some((id, sample)) => self.projection.project(&sample, id),
            None => {
                trace!("Mailbox closed, reporting target as not seen.");
                LocationReading::not_seen(0)
            }
        }
    }
}
