use std::fmt;
use std::mem;

use crate::connection::{ConnectionError, ConnectionId};
use crate::ofp_header::Xid;

/// Kinds of fragmentable replies the core reassembles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReplyCategory {
    PortDesc,
    Flow,
}

impl fmt::Display for ReplyCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReplyCategory::PortDesc => f.write_str("port description"),
            ReplyCategory::Flow => f.write_str("flow statistics"),
        }
    }
}

#[derive(Debug)]
enum State<T> {
    Idle,
    Collecting {
        xid: Xid,
        entries: Vec<T>,
        fragments: usize,
    },
}

/// Accumulates the fragments of one in-flight reply of a single category.
///
/// `begin` moves to `Collecting` for the xid of the request just sent, and the fragment
/// without the "more" flag moves back to `Idle`. Only a new `begin` abandons partial data.
/// Fragments of any other transaction are logged and dropped.
#[derive(Debug)]
pub struct Reassembly<T> {
    connection: ConnectionId,
    category: ReplyCategory,
    state: State<T>,
    abandoned: usize,
}

impl<T> Reassembly<T> {
    pub fn new(connection: ConnectionId, category: ReplyCategory) -> Reassembly<T> {
        Reassembly {
            connection,
            category,
            state: State::Idle,
            abandoned: 0,
        }
    }

    fn abandon(&mut self) {
        if let State::Collecting { xid, fragments, .. } = mem::replace(&mut self.state, State::Idle)
        {
            self.abandoned += 1;
            warn!(
                "{}: {}",
                self.connection,
                ConnectionError::FragmentReassemblyAbandoned {
                    category: self.category.to_string(),
                    xid,
                    fragments,
                }
            );
        }
    }

    /// A new request of this category was sent with `xid`.
    pub fn begin(&mut self, xid: Xid) {
        self.abandon();
        self.state = State::Collecting {
            xid,
            entries: vec![],
            fragments: 0,
        };
    }

    /// Feed one fragment. Returns every entry of the reply once the last fragment arrived.
    pub fn accept(&mut self, xid: Xid, mut part: Vec<T>, more: bool) -> Option<Vec<T>> {
        match &mut self.state {
            State::Collecting {
                xid: pending,
                entries,
                fragments,
            } if *pending == xid => {
                entries.append(&mut part);
                *fragments += 1;
            }
            State::Collecting { xid: pending, .. } => {
                warn!(
                    "{}: dropping {} fragment with xid {} while collecting xid {}",
                    self.connection, self.category, xid, pending
                );
                return None;
            }
            State::Idle => {
                warn!(
                    "{}: dropping unrequested {} fragment with xid {}",
                    self.connection, self.category, xid
                );
                return None;
            }
        }
        if more {
            return None;
        }
        match mem::replace(&mut self.state, State::Idle) {
            State::Collecting { entries, .. } => Some(entries),
            State::Idle => None,
        }
    }

    /// Drop any partial data without warning, e.g. when the connection goes away.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    pub fn pending_xid(&self) -> Option<Xid> {
        match self.state {
            State::Collecting { xid, .. } => Some(xid),
            State::Idle => None,
        }
    }

    /// Number of partial replies dropped so far.
    pub fn abandoned(&self) -> usize {
        self.abandoned
    }
}
