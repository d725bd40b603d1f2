use crate::error::{CanError, Result};
use crate::identifier::{Identifier, MAX_11_BIT_IDENTIFIER, MAX_29_BIT_IDENTIFIER};

/// Acceptance filter and mask for a hardware receive filter.
///
/// An identifier passes when its masked bits equal the masked filter bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AcceptanceFilter {
    pub filter: u32,
    pub mask: u32,
}

impl AcceptanceFilter {
    /// Returns true if `id` (bus id, no marker) passes the filter.
    pub fn accepts(&self, id: u32) -> bool {
        id & self.mask == self.filter & self.mask
    }
}

impl std::fmt::Display for AcceptanceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "filter=0x{:08X} mask=0x{:08X}", self.filter, self.mask)
    }
}

/// Combined filter/mask passing every identifier in `ids`.
///
/// The filter is the AND of all ids. The mask keeps the bits on which all
/// ids agree, within the 11-bit range, or the 29-bit range as soon as one
/// id is extended.
pub fn calculate_filter(ids: &[Identifier]) -> Result<AcceptanceFilter> {
    let first = ids.first().ok_or(CanError::EmptyFilterSet)?;

    let any_extended = ids.iter().any(Identifier::is_extended);
    let (and, or) = ids
        .iter()
        .fold((first.id(), first.id()), |(and, or), id| (and & id.id(), or | id.id()));

    let full = if any_extended {
        MAX_29_BIT_IDENTIFIER
    } else {
        MAX_11_BIT_IDENTIFIER
    };

    Ok(AcceptanceFilter {
        filter: and,
        mask: (or ^ and) ^ full,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::CAN_EXTENDED_ID;

    fn ids(raw: &[u32]) -> Vec<Identifier> {
        raw.iter().map(|r| Identifier::new(*r).unwrap()).collect()
    }

    #[test]
    fn single_identifier_matches_exactly() {
        let filter = calculate_filter(&ids(&[0x7E1])).unwrap();
        assert_eq!(filter, AcceptanceFilter { filter: 0x7E1, mask: 0x7FF });
        assert!(filter.accepts(0x7E1));
        assert!(!filter.accepts(0x7E0));
    }

    #[test]
    fn pair_of_standard_ids() {
        let filter = calculate_filter(&ids(&[0x7E0, 0x7E1])).unwrap();
        assert_eq!(filter.filter, 0x7E0);
        assert_eq!(filter.mask, 0x7FE);
    }

    #[test]
    fn extended_member_widens_mask() {
        let filter = calculate_filter(&ids(&[0x100, 0x101 | CAN_EXTENDED_ID])).unwrap();
        assert_eq!(filter.filter, 0x100);
        assert_eq!(filter.mask, 0x1FFF_FFFE);
    }

    #[test]
    fn every_member_is_accepted() {
        let sets: [&[u32]; 5] = [
            &[0x000, 0x7FF],
            &[0x123, 0x321, 0x213],
            &[0x18DA_00F1 | CAN_EXTENDED_ID, 0x18DA_F100 | CAN_EXTENDED_ID],
            &[0x7E0, 0x7E8, 0x7DF, 0x1_0000 | CAN_EXTENDED_ID],
            &[0x555, 0x2AA],
        ];
        for set in sets {
            let members = ids(set);
            let filter = calculate_filter(&members).unwrap();
            for member in &members {
                assert!(filter.accepts(member.id()), "{member} not accepted by {filter}");
            }
        }
    }

    #[test]
    fn empty_set_rejected() {
        assert!(matches!(calculate_filter(&[]), Err(CanError::EmptyFilterSet)));
    }
}
