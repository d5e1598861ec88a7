//! crates/training_tracker_core/src/scheduler.rs
//!
//! The expiration scheduler: computes whether an assigned course is due for
//! renewal, given the course catalog and the assignment timestamp.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use crate::domain::{timestamp, CourseSchedule, ExpiringCourse, Priority, UserExpirations};
use crate::registry::DocumentRegistry;

/// Warning window before the hard expiry date during which a course is
/// already reported as expiring.
pub const DEFAULT_BUFFER_DAYS: i64 = 30;

/// Renewal periods are quoted in months but computed as flat 30-day units.
/// Calendar-accurate month arithmetic would move expiry dates for existing
/// records, so this stays a deliberate simplification.
const DAYS_PER_MONTH: i64 = 30;

/// Catalog-driven due/expired computation. The catalog is reference data,
/// seeded from the built-in course table and extended at runtime with the
/// renewal parameters the classifier reports per course.
pub struct ExpirationScheduler {
    catalog: RwLock<HashMap<String, CourseSchedule>>,
}

impl ExpirationScheduler {
    pub fn new(catalog: HashMap<String, CourseSchedule>) -> Self {
        Self {
            catalog: RwLock::new(catalog),
        }
    }

    /// A scheduler seeded with the standard safety-course catalog.
    pub fn with_default_catalog() -> Self {
        Self::new(default_catalog())
    }

    fn catalog(&self) -> RwLockReadGuard<'_, HashMap<String, CourseSchedule>> {
        self.catalog.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds or replaces one catalog entry.
    pub fn register_course(&self, course_id: &str, schedule: CourseSchedule) {
        let mut catalog = self.catalog.write().unwrap_or_else(|e| e.into_inner());
        catalog.insert(course_id.to_string(), schedule);
    }

    pub fn schedule(&self, course_id: &str) -> Option<CourseSchedule> {
        self.catalog().get(course_id).copied()
    }

    pub fn priority(&self, course_id: &str) -> Priority {
        self.schedule(course_id).map(|s| s.priority).unwrap_or_default()
    }

    /// Whether an assignment is inside its warning buffer or past expiry.
    ///
    /// A course with no catalog entry never expires. The course counts as
    /// "expiring/expired" from `buffer_days` before the hard expiry date;
    /// callers distinguish real urgency via [`days_until_expiry`](Self::days_until_expiry).
    pub fn is_expired_at(
        &self,
        course_id: &str,
        assigned_at: DateTime<Utc>,
        buffer_days: i64,
    ) -> bool {
        self.is_expired_relative(course_id, assigned_at, buffer_days, Utc::now())
    }

    /// String-timestamp variant for records whose timestamps arrive as text.
    /// A malformed timestamp is treated as "not expired" (fail-open) so one
    /// bad record can never abort or poison a bulk sweep.
    pub fn is_expired(&self, course_id: &str, assigned_at: &str, buffer_days: i64) -> bool {
        match parse_timestamp(assigned_at) {
            Some(assigned) => self.is_expired_at(course_id, assigned, buffer_days),
            None => false,
        }
    }

    fn is_expired_relative(
        &self,
        course_id: &str,
        assigned_at: DateTime<Utc>,
        buffer_days: i64,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(schedule) = self.schedule(course_id) else {
            return false;
        };
        let expiry =
            assigned_at + Duration::days(i64::from(schedule.renewal_months) * DAYS_PER_MONTH);
        let warning_start = expiry - Duration::days(buffer_days);
        now >= warning_start
    }

    /// Days until the hard expiry date, negative once past it. `None` for
    /// courses without a catalog entry.
    pub fn days_until_expiry(&self, course_id: &str, assigned_at: DateTime<Utc>) -> Option<i64> {
        let schedule = self.schedule(course_id)?;
        let expiry =
            assigned_at + Duration::days(i64::from(schedule.renewal_months) * DAYS_PER_MONTH);
        Some((expiry - Utc::now()).num_days())
    }

    /// Sweeps every user's full history and groups expiring courses by user.
    ///
    /// O(users x assignments x courses); acceptable at the intended scale of
    /// tens of users with single-digit assignments per document.
    pub async fn expiring_across_org(&self, registry: &DocumentRegistry) -> Vec<UserExpirations> {
        let mut expiring = Vec::new();

        for (user_id, history) in registry.all_histories().await {
            let mut user_expired = Vec::new();
            for entry in &history {
                for course_id in &entry.courses {
                    if self.is_expired_at(course_id, entry.assigned_at, DEFAULT_BUFFER_DAYS) {
                        let period_months = self
                            .schedule(course_id)
                            .map(|s| s.renewal_months)
                            .unwrap_or(0);
                        user_expired.push(ExpiringCourse {
                            course_id: course_id.clone(),
                            assigned_at: entry.assigned_at,
                            period_months,
                        });
                    }
                }
            }
            if !user_expired.is_empty() {
                expiring.push(UserExpirations {
                    user_id,
                    expired_courses: user_expired,
                });
            }
        }

        expiring
    }

    /// Whether a previously granted course should be offered again: it must
    /// appear in the user's history and its most recent occurrence must be
    /// expired. Gates the classifier's duplicate skipping.
    pub async fn should_reassign(
        &self,
        user_id: &str,
        course_id: &str,
        registry: &DocumentRegistry,
    ) -> bool {
        let history = registry.user_history(user_id).await;
        let latest = history
            .iter()
            .filter(|entry| entry.courses.iter().any(|c| c == course_id))
            .max_by_key(|entry| entry.assigned_at);

        match latest {
            Some(entry) => self.is_expired_at(course_id, entry.assigned_at, DEFAULT_BUFFER_DAYS),
            None => false,
        }
    }
}

/// The built-in course table, mirroring the department's standing catalog.
pub fn default_catalog() -> HashMap<String, CourseSchedule> {
    let annually = CourseSchedule {
        renewal_months: 12,
        deadline_days: 30,
        priority: Priority::Normal,
    };
    let biennially = CourseSchedule {
        renewal_months: 24,
        deadline_days: 30,
        priority: Priority::Normal,
    };

    HashMap::from([
        ("HAZCOM-1910.1200".to_string(), annually),
        ("LAB-SAFETY-101".to_string(), annually),
        ("Radiation Safety".to_string(), biennially),
        ("Radiation Safety Fundamentals".to_string(), biennially),
        ("RADIATION-ALARA-101".to_string(), biennially),
        ("X-Ray Safety Training".to_string(), biennially),
        ("X-Ray Radiation Protection".to_string(), biennially),
    ])
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Zone-less timestamps from historic records are taken as UTC.
    NaiveDateTime::parse_from_str(raw, timestamp::FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Assignment;
    use crate::memory::MemoryStore;
    use std::sync::Arc;

    fn days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - Duration::days(days)
    }

    #[test]
    fn unknown_courses_never_expire() {
        let scheduler = ExpirationScheduler::with_default_catalog();
        assert!(!scheduler.is_expired_at("NO-SUCH-COURSE", days_ago(10_000), 30));
        assert!(!scheduler.is_expired("NO-SUCH-COURSE", "2015-01-01T00:00:00Z", 30));
    }

    #[test]
    fn expiration_boundary_sits_at_the_warning_start() {
        let scheduler = ExpirationScheduler::with_default_catalog();
        let assigned = Utc::now() - Duration::days(500);

        // renewal 12 months => 360 days; warning starts 30 days earlier.
        let inside = assigned + Duration::days(12 * 30 - 30 - 1);
        let outside = assigned + Duration::days(12 * 30 - 30 + 1);
        assert!(!scheduler.is_expired_relative("LAB-SAFETY-101", assigned, 30, inside));
        assert!(scheduler.is_expired_relative("LAB-SAFETY-101", assigned, 30, outside));

        // Still "expired" well inside the warning window, before hard expiry.
        let warning_window = assigned + Duration::days(12 * 30 - 10);
        assert!(scheduler.is_expired_relative("LAB-SAFETY-101", assigned, 30, warning_window));
    }

    #[test]
    fn malformed_timestamps_fail_open() {
        let scheduler = ExpirationScheduler::with_default_catalog();
        assert!(!scheduler.is_expired("LAB-SAFETY-101", "not-a-date", 30));
        assert!(!scheduler.is_expired("LAB-SAFETY-101", "", 30));
    }

    #[test]
    fn string_timestamps_accept_rfc3339_and_naive_forms() {
        let scheduler = ExpirationScheduler::with_default_catalog();
        // 400 days ago is past a 12-month renewal no matter the format.
        let old = Utc::now() - Duration::days(400);
        let rfc3339 = old.to_rfc3339();
        let naive = old.format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        assert!(scheduler.is_expired("LAB-SAFETY-101", &rfc3339, 30));
        assert!(scheduler.is_expired("LAB-SAFETY-101", &naive, 30));
    }

    #[test]
    fn registered_courses_join_the_catalog() {
        let scheduler = ExpirationScheduler::with_default_catalog();
        assert!(scheduler.schedule("FORKLIFT-201").is_none());

        scheduler.register_course(
            "FORKLIFT-201",
            CourseSchedule {
                renewal_months: 6,
                deadline_days: 14,
                priority: Priority::High,
            },
        );

        assert!(scheduler.is_expired_at("FORKLIFT-201", days_ago(6 * 30), 30));
        assert_eq!(scheduler.priority("FORKLIFT-201"), Priority::High);
    }

    #[test]
    fn days_until_expiry_goes_negative_after_the_deadline() {
        let scheduler = ExpirationScheduler::with_default_catalog();

        let fresh = scheduler
            .days_until_expiry("LAB-SAFETY-101", days_ago(0))
            .unwrap();
        assert!(fresh >= 359 && fresh <= 360);

        let overdue = scheduler
            .days_until_expiry("LAB-SAFETY-101", days_ago(400))
            .unwrap();
        assert!(overdue < 0);

        assert!(scheduler.days_until_expiry("NO-SUCH-COURSE", days_ago(0)).is_none());
    }

    #[tokio::test]
    async fn should_reassign_requires_an_expired_latest_occurrence() {
        let registry = DocumentRegistry::open(Arc::new(MemoryStore::new())).await;
        let scheduler = ExpirationScheduler::with_default_catalog();

        // Never assigned: nothing to renew.
        assert!(!scheduler.should_reassign("U1", "LAB-SAFETY-101", &registry).await);

        registry
            .save(
                "fresh assignment",
                &[Assignment {
                    user_id: "U1".to_string(),
                    courses_assigned: vec!["LAB-SAFETY-101".to_string()],
                    reason: String::new(),
                    course_periods: Vec::new(),
                }],
                Vec::new(),
            )
            .await
            .unwrap();

        // Just assigned: latest occurrence is current.
        assert!(!scheduler.should_reassign("U1", "LAB-SAFETY-101", &registry).await);
    }

    #[tokio::test]
    async fn org_sweep_groups_expiring_courses_by_user() {
        let registry = DocumentRegistry::open(Arc::new(MemoryStore::new())).await;
        let scheduler = ExpirationScheduler::with_default_catalog();

        registry
            .save(
                "recent doc",
                &[Assignment {
                    user_id: "U1".to_string(),
                    courses_assigned: vec!["LAB-SAFETY-101".to_string()],
                    reason: String::new(),
                    course_periods: Vec::new(),
                }],
                Vec::new(),
            )
            .await
            .unwrap();

        // Nothing is near expiry yet.
        assert!(scheduler.expiring_across_org(&registry).await.is_empty());

        // A monthly course with the default 30-day buffer is inside its
        // warning window from the moment it is assigned.
        scheduler.register_course(
            "MONTHLY-REFRESHER",
            CourseSchedule {
                renewal_months: 1,
                deadline_days: 7,
                priority: Priority::Normal,
            },
        );
        registry
            .save(
                "monthly refresher doc",
                &[Assignment {
                    user_id: "U2".to_string(),
                    courses_assigned: vec!["MONTHLY-REFRESHER".to_string()],
                    reason: String::new(),
                    course_periods: Vec::new(),
                }],
                Vec::new(),
            )
            .await
            .unwrap();

        let expiring = scheduler.expiring_across_org(&registry).await;
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].user_id, "U2");
        assert_eq!(expiring[0].expired_courses.len(), 1);
        assert_eq!(expiring[0].expired_courses[0].course_id, "MONTHLY-REFRESHER");
        assert_eq!(expiring[0].expired_courses[0].period_months, 1);
    }
}
