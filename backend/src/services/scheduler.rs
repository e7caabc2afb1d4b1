//! Daily triggers at a fixed local time of day

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use std::future::Future;

/// Next occurrence of `at` local time strictly after `now`
pub fn next_run(now: DateTime<Utc>, at: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local = now.with_timezone(&offset);
    let today = local.date_naive().and_time(at);

    let candidate = if today > local.naive_local() {
        today
    } else {
        today + Duration::days(1)
    };

    // Fixed offsets have no gaps, so the mapping is always single
    offset
        .from_local_datetime(&candidate)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now + Duration::days(1))
}

/// Run `job` every day at `at` until the task is dropped
pub async fn run_daily<F, Fut>(name: &'static str, at: NaiveTime, offset: FixedOffset, mut job: F)
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let now = Utc::now();
        let next = next_run(now, at, offset);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!("Next {} run at {}", name, next.with_timezone(&offset));

        tokio::time::sleep(wait).await;
        job(Utc::now()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tehran() -> FixedOffset {
        FixedOffset::east_opt(210 * 60).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        // 03:00 UTC is 06:30 local
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        let at = NaiveTime::from_hms_opt(7, 30, 0).unwrap();
        assert_eq!(
            next_run(now, at, tehran()),
            Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        let at = NaiveTime::from_hms_opt(7, 30, 0).unwrap();
        let exactly = Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap();
        assert_eq!(
            next_run(exactly, at, tehran()),
            Utc.with_ymd_and_hms(2024, 1, 2, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_across_local_midnight() {
        // 21:00 UTC is 00:30 local on the next day
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 21, 0, 0).unwrap();
        let at = NaiveTime::from_hms_opt(7, 30, 0).unwrap();
        assert_eq!(
            next_run(now, at, tehran()),
            Utc.with_ymd_and_hms(2024, 1, 2, 4, 0, 0).unwrap()
        );
    }
}
