use std::fmt;

/// Index of a device's presence slot.
pub type SlotId = usize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: u16,
    pub name: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RosterError {
    Empty,
    DuplicateId(u16),
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterError::Empty => write!(f, "device roster is empty"),
            RosterError::DuplicateId(id) => {
                write!(f, "device id 0x{:04X} appears more than once", id)
            }
        }
    }
}

impl std::error::Error for RosterError {}

/// The fixed set of tracked beacons. Slot indices follow entry order.
#[derive(Clone, Debug)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new(entries: Vec<RosterEntry>) -> Result<Self, RosterError> {
        if entries.is_empty() {
            return Err(RosterError::Empty);
        }
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|other| other.id == entry.id) {
                return Err(RosterError::DuplicateId(entry.id));
            }
        }
        Ok(Roster { entries })
    }

    pub fn lookup(&self, id: u16) -> Option<SlotId> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    pub fn name(&self, slot: SlotId) -> &str {
        self.entries
            .get(slot)
            .map(|entry| entry.name.as_str())
            .unwrap_or("unknown")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u16, name: &str) -> RosterEntry {
        RosterEntry {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_lookup() {
        let roster = Roster::new(vec![entry(0xAABB, "left"), entry(0xCCDD, "right")]).unwrap();
        assert_eq!(roster.lookup(0xAABB), Some(0));
        assert_eq!(roster.lookup(0xCCDD), Some(1));
        assert_eq!(roster.lookup(0x1234), None);
        assert_eq!(roster.name(1), "right");
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = Roster::new(vec![entry(0xAABB, "a"), entry(0xAABB, "b")]).unwrap_err();
        assert_eq!(err, RosterError::DuplicateId(0xAABB));
        assert_eq!(err.to_string(), "device id 0xAABB appears more than once");
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(Roster::new(vec![]).unwrap_err(), RosterError::Empty);
    }
}
