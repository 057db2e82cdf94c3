// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::*;
use crate::function::*;

/// Channel ID bit marking a channel that forwards requests between execution environments.
pub const MPXY_CHANNEL_REQFWD: u64 = 0x10;

/// RPMI request-forward service: fetch the request currently queued for this side.
pub const RPMI_REQFWD_RETRIEVE_MESSAGE: u64 = 0x02;
/// RPMI request-forward service: the forwarded request has been serviced.
pub const RPMI_REQFWD_COMPLETE_MESSAGE: u64 = 0x03;

/// Functions defined for the MPXY (message proxy) extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MpxyFunction {
    /// Returns the size of the per-hart shared memory region.
    GetShmemSize,
    /// Sets the guest physical address of the calling hart's shared memory.
    SetShmem {
        /// a0 - low XLEN bits of the shared memory address.
        base: u64,
    },
    /// Writes the list of channel IDs to shared memory, starting at `start_index`.
    GetChannelIds {
        /// a0 - index of the first channel ID to return.
        start_index: u64,
    },
    /// Writes `count` attributes of `channel_id` to shared memory.
    ReadAttributes {
        /// a0 - channel to query.
        channel_id: u64,
        /// a1 - first attribute ID.
        base_attribute_id: u64,
        /// a2 - number of attributes.
        count: u64,
    },
    /// Updates `count` attributes of `channel_id` from shared memory.
    WriteAttributes {
        /// a0 - channel to update.
        channel_id: u64,
        /// a1 - first attribute ID.
        base_attribute_id: u64,
        /// a2 - number of attributes.
        count: u64,
    },
    /// Sends the message in shared memory over `channel_id` and waits for the response.
    SendMessageWithResponse {
        /// a0 - channel to send on.
        channel_id: u64,
        /// a1 - message ID of the transport protocol.
        message_id: u64,
        /// a2 - length of the message data in shared memory.
        message_len: u64,
    },
}

impl MpxyFunction {
    /// Attempts to parse `Self` from the passed in `a0-a7`.
    pub(crate) fn from_regs(args: &[u64]) -> Result<Self> {
        use MpxyFunction::*;
        match args[6] {
            0 => Ok(GetShmemSize),
            1 => Ok(SetShmem { base: args[0] }),
            2 => Ok(GetChannelIds {
                start_index: args[0],
            }),
            3 => Ok(ReadAttributes {
                channel_id: args[0],
                base_attribute_id: args[1],
                count: args[2],
            }),
            4 => Ok(WriteAttributes {
                channel_id: args[0],
                base_attribute_id: args[1],
                count: args[2],
            }),
            5 => Ok(SendMessageWithResponse {
                channel_id: args[0],
                message_id: args[1],
                message_len: args[2],
            }),
            _ => Err(Error::NotSupported),
        }
    }
}

impl SbiFunction for MpxyFunction {
    fn a6(&self) -> u64 {
        use MpxyFunction::*;
        match self {
            GetShmemSize => 0,
            SetShmem { .. } => 1,
            GetChannelIds { .. } => 2,
            ReadAttributes { .. } => 3,
            WriteAttributes { .. } => 4,
            SendMessageWithResponse { .. } => 5,
        }
    }

    fn a0(&self) -> u64 {
        use MpxyFunction::*;
        match *self {
            GetShmemSize => 0,
            SetShmem { base } => base,
            GetChannelIds { start_index } => start_index,
            ReadAttributes { channel_id, .. } => channel_id,
            WriteAttributes { channel_id, .. } => channel_id,
            SendMessageWithResponse { channel_id, .. } => channel_id,
        }
    }

    fn a1(&self) -> u64 {
        use MpxyFunction::*;
        match *self {
            ReadAttributes {
                base_attribute_id, ..
            } => base_attribute_id,
            WriteAttributes {
                base_attribute_id, ..
            } => base_attribute_id,
            SendMessageWithResponse { message_id, .. } => message_id,
            _ => 0,
        }
    }

    fn a2(&self) -> u64 {
        use MpxyFunction::*;
        match *self {
            ReadAttributes { count, .. } => count,
            WriteAttributes { count, .. } => count,
            SendMessageWithResponse { message_len, .. } => message_len,
            _ => 0,
        }
    }
}

/// Completion header at the start of the shared memory of a request-forwarding channel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReqFwdCompletion {
    /// SBI status of the forwarded request.
    pub status: i32,
    /// Number of requests completed by this message.
    pub count: u32,
}

impl ReqFwdCompletion {
    /// Returns the header as it is laid out in guest memory.
    pub fn to_le_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.status.to_le_bytes());
        bytes[4..].copy_from_slice(&self.count.to_le_bytes());
        bytes
    }
}
