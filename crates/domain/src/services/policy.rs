use crate::model::ProviderSource;

/// Credits charged to a user-submitted provider for every disclosed lead.
pub const LEAD_COST: i64 = 10;

/// Whether revealing a provider's contacts is free or charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisclosureTerms {
    Free,
    Metered { cost: i64 },
}

impl DisclosureTerms {
    pub fn cost(&self) -> i64 {
        match self {
            DisclosureTerms::Free => 0,
            DisclosureTerms::Metered { cost } => *cost,
        }
    }
}

/// Directory imports are public data; user-submitted providers pay per lead.
pub fn classify(source: ProviderSource) -> DisclosureTerms {
    match source {
        ProviderSource::DirectoryImport => DisclosureTerms::Free,
        ProviderSource::UserSubmitted => DisclosureTerms::Metered { cost: LEAD_COST },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_imports_are_free() {
        assert_eq!(classify(ProviderSource::DirectoryImport), DisclosureTerms::Free);
        assert_eq!(classify(ProviderSource::DirectoryImport).cost(), 0);
    }

    #[test]
    fn user_submissions_pay_the_lead_cost() {
        assert_eq!(
            classify(ProviderSource::UserSubmitted),
            DisclosureTerms::Metered { cost: 10 }
        );
    }
}
