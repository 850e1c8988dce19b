//! Property-based tests for entry validation rules.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::error::LedgerError;
use super::types::{EntryLine, amount_fits_storage};
use super::validation::validate_lines;

/// Strategy to generate a valid positive amount (> 0).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    // 0.01 to 1,000,000.00
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for a balanced set of lines: arbitrary debits against one credit
/// and arbitrary credits against one debit.
fn balanced_lines() -> impl Strategy<Value = Vec<EntryLine>> {
    (
        proptest::collection::vec(positive_amount(), 1..6),
        proptest::collection::vec(positive_amount(), 0..6),
    )
        .prop_map(|(debits, credits)| {
            let debit_total: Decimal = debits.iter().copied().sum();
            let credit_total: Decimal = credits.iter().copied().sum();

            let mut lines: Vec<EntryLine> = debits
                .into_iter()
                .map(|amount| EntryLine::debit(AccountId::new(), amount))
                .collect();
            lines.extend(
                credits
                    .into_iter()
                    .map(|amount| EntryLine::credit(AccountId::new(), amount)),
            );
            lines.push(EntryLine::credit(AccountId::new(), debit_total));
            if credit_total > Decimal::ZERO {
                lines.push(EntryLine::debit(AccountId::new(), credit_total));
            }
            lines
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every accepted entry has equal, strictly positive totals.
    #[test]
    fn prop_accepted_entries_balance(lines in balanced_lines()) {
        let totals = validate_lines(&lines).unwrap();
        prop_assert_eq!(totals.debit, totals.credit);
        prop_assert!(totals.debit > Decimal::ZERO);
    }

    /// Nudging any single amount breaks the balance and is rejected.
    #[test]
    fn prop_skewed_entries_rejected(
        lines in balanced_lines(),
        pick in any::<prop::sample::Index>(),
        skew in positive_amount(),
    ) {
        let mut lines = lines;
        let index = pick.index(lines.len());
        let line = &mut lines[index];
        if line.debit > Decimal::ZERO {
            line.debit += skew;
        } else {
            line.credit += skew;
        }

        let is_unbalanced = matches!(
            validate_lines(&lines),
            Err(LedgerError::UnbalancedEntry { .. })
        );
        prop_assert!(is_unbalanced);
    }

    /// A line carrying both sides is rejected whatever the totals.
    #[test]
    fn prop_two_sided_line_rejected(lines in balanced_lines(), amount in positive_amount()) {
        let mut lines = lines;
        lines[0].credit += amount;
        lines[0].debit += amount;

        let is_invalid_sides = matches!(
            validate_lines(&lines),
            Err(LedgerError::InvalidLineSides { index: 0 })
        );
        prop_assert!(is_invalid_sides);
    }

    /// Any amount, however large or precise, yields a typed result; an
    /// accepted entry always fits the stored precision.
    #[test]
    fn prop_arbitrary_amounts_never_panic(
        amounts in proptest::collection::vec(
            prop_oneof![
                Just(Decimal::MAX),
                (any::<i64>(), 0u32..=28).prop_map(|(m, scale)| Decimal::new(m, scale).abs()),
            ],
            2..6,
        )
    ) {
        let mut lines: Vec<EntryLine> = amounts
            .iter()
            .map(|amount| EntryLine::debit(AccountId::new(), *amount))
            .collect();
        lines.push(EntryLine::credit(AccountId::new(), Decimal::MAX));

        if let Ok(totals) = validate_lines(&lines) {
            prop_assert!(amount_fits_storage(totals.debit));
        }
    }
}
