use chrono::{DateTime, Duration, Utc};

use crate::errors::{BillingError, Result};

/// Trial dates derived from a subscription request at a given instant.
///
/// `expires_at` goes to the gateway; `trial_ends_at` goes to the local
/// record. They only differ when the trial is skipped: the gateway is told
/// to bill right away, while locally there is no trial at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialWindow {
    pub expires_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

impl TrialWindow {
    /// `skip_trial` wins over `trial_days`; zero days means no trial.
    pub fn resolve(skip_trial: bool, trial_days: Option<u32>, now: DateTime<Utc>) -> Result<Self> {
        if skip_trial {
            return Ok(Self {
                expires_at: Some(now),
                trial_ends_at: None,
            });
        }

        match trial_days.filter(|days| *days > 0) {
            Some(days) => {
                let ends = Duration::try_days(i64::from(days))
                    .and_then(|length| now.checked_add_signed(length))
                    .ok_or_else(|| {
                        BillingError::ValidationError(format!(
                            "Trial of {} days is out of range",
                            days
                        ))
                    })?;
                Ok(Self {
                    expires_at: Some(ends),
                    trial_ends_at: Some(ends),
                })
            }
            None => Ok(Self {
                expires_at: None,
                trial_ends_at: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_trial_configured() {
        let now = Utc::now();
        let window = TrialWindow::resolve(false, None, now).unwrap();
        assert_eq!(window.expires_at, None);
        assert_eq!(window.trial_ends_at, None);
    }

    #[test]
    fn test_trial_days_apply_to_both_dates() {
        let now = Utc::now();
        let window = TrialWindow::resolve(false, Some(7), now).unwrap();
        assert_eq!(window.expires_at, Some(now + Duration::days(7)));
        assert_eq!(window.trial_ends_at, Some(now + Duration::days(7)));
    }

    // Skipping bills immediately on the gateway but leaves no local trial.
    #[test]
    fn test_skip_trial_diverges_between_gateway_and_record() {
        let now = Utc::now();
        let window = TrialWindow::resolve(true, None, now).unwrap();
        assert_eq!(window.expires_at, Some(now));
        assert_eq!(window.trial_ends_at, None);
    }

    #[test]
    fn test_skip_trial_overrides_trial_days() {
        let now = Utc::now();
        assert_eq!(
            TrialWindow::resolve(true, Some(30), now).unwrap(),
            TrialWindow::resolve(true, None, now).unwrap()
        );
    }

    #[test]
    fn test_zero_days_is_no_trial() {
        let now = Utc::now();
        assert_eq!(
            TrialWindow::resolve(false, Some(0), now).unwrap(),
            TrialWindow::resolve(false, None, now).unwrap()
        );
    }

    #[test]
    fn test_oversized_trial_is_an_error() {
        let result = TrialWindow::resolve(false, Some(u32::MAX), Utc::now());
        assert!(matches!(result, Err(BillingError::ValidationError(_))));
    }

    #[test]
    fn test_skip_trial_ignores_oversized_days() {
        assert!(TrialWindow::resolve(true, Some(u32::MAX), Utc::now()).is_ok());
    }
}
