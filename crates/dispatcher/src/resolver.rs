//! 调度解析
//!
//! 把一组调度定义在窗口内展开、合并并排序：
//!
//! 1. 丢弃有效期与窗口不相交（或被标记忽略）的定义
//! 2. 汇总所有 CANCEL 定义的屏蔽区间
//! 3. 展开其余定义的触发时刻，丢弃落在屏蔽区间内或有效期外的时刻
//! 4. 按 `(时刻, 优先级, id)` 排序
//!
//! 优先级和 id 只决定同一时刻的先后，不决定时刻是否存在。

use chrono::{DateTime, Utc};

use batchsync_domain::{ScheduleDefinition, TimeWindow};

use crate::occurrence::{Generated, OccurrenceGenerator};

/// 一个需要生成作业的触发时刻
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOccurrence<'a> {
    pub instant: DateTime<Utc>,
    pub schedef: &'a ScheduleDefinition,
}

impl ResolvedOccurrence<'_> {
    /// 幂等键 `(schedefId, timestamp)`
    pub fn idempotency_key(&self) -> (&str, DateTime<Utc>) {
        (self.schedef.id.as_str(), self.instant)
    }
}

/// 解析结果，包含被屏蔽的时刻以便记录
#[derive(Debug, Clone, Default)]
pub struct Resolution<'a> {
    pub occurrences: Vec<ResolvedOccurrence<'a>>,
    pub suppressed: Vec<ResolvedOccurrence<'a>>,
}

/// 合并后的屏蔽区间集合，区间按起点排序且互不重叠
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuppressionSet {
    intervals: Vec<TimeWindow>,
}

impl SuppressionSet {
    pub fn new<I: IntoIterator<Item = TimeWindow>>(windows: I) -> Self {
        let mut windows: Vec<_> = windows.into_iter().filter(|w| !w.is_empty()).collect();
        windows.sort_by_key(|w| (w.from, w.to));

        let mut intervals: Vec<TimeWindow> = Vec::with_capacity(windows.len());
        for window in windows {
            match intervals.last_mut() {
                Some(last) if window.from <= last.to => {
                    if window.to > last.to {
                        last.to = window.to;
                    }
                }
                _ => intervals.push(window),
            }
        }
        Self { intervals }
    }

    pub fn intervals(&self) -> &[TimeWindow] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let index = self.intervals.partition_point(|w| w.from <= instant);
        index > 0 && self.intervals[index - 1].contains(instant)
    }
}

pub struct ScheduleResolver;

impl ScheduleResolver {
    pub fn resolve<'a>(
        schedefs: &'a [ScheduleDefinition],
        window: &TimeWindow,
    ) -> Vec<ResolvedOccurrence<'a>> {
        Self::resolve_detailed(schedefs, window).occurrences
    }

    pub fn resolve_detailed<'a>(
        schedefs: &'a [ScheduleDefinition],
        window: &TimeWindow,
    ) -> Resolution<'a> {
        let effective: Vec<&ScheduleDefinition> = schedefs
            .iter()
            .filter(|schedef| schedef.validity_period.overlaps(window))
            .collect();

        let (suppressing, producing): (Vec<_>, Vec<_>) = effective
            .into_iter()
            .partition(|schedef| schedef.trigger.is_suppressing());

        let suppression = SuppressionSet::new(
            suppressing
                .iter()
                .filter_map(|schedef| schedef.trigger.blackout()),
        );

        let mut resolution = Resolution::default();
        for schedef in producing {
            let instants = match OccurrenceGenerator::generate(&schedef.trigger, window) {
                Generated::Instants(instants) => instants,
                Generated::Blackout(_) => continue,
            };
            for instant in instants.filter(|instant| schedef.is_effective_at(*instant)) {
                let occurrence = ResolvedOccurrence { instant, schedef };
                if suppression.contains(instant) {
                    resolution.suppressed.push(occurrence);
                } else {
                    resolution.occurrences.push(occurrence);
                }
            }
        }

        resolution.occurrences.sort_by(|a, b| {
            (a.instant, a.schedef.priority, a.schedef.id.as_str()).cmp(&(
                b.instant,
                b.schedef.priority,
                b.schedef.id.as_str(),
            ))
        });
        resolution
            .suppressed
            .sort_by(|a, b| (a.instant, a.schedef.id.as_str()).cmp(&(b.instant, b.schedef.id.as_str())));
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchsync_domain::{Audit, Priority, TriggerRule, ValidityPeriod};
    use chrono::{Duration, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn schedef(id: &str, priority: char, trigger: TriggerRule) -> ScheduleDefinition {
        ScheduleDefinition::new(
            id,
            "jobdef",
            Priority::new(priority).unwrap(),
            trigger,
            ValidityPeriod::default(),
            Audit::registered("test", utc(2024, 1, 1, 0)),
        )
        .unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(utc(2024, 1, 1, 0), utc(2024, 1, 4, 0))
    }

    #[test]
    fn test_suppression_set_merges_overlaps() {
        let set = SuppressionSet::new([
            TimeWindow::new(utc(2024, 1, 2, 0), utc(2024, 1, 3, 0)),
            TimeWindow::new(utc(2024, 1, 1, 0), utc(2024, 1, 2, 0)),
            TimeWindow::new(utc(2024, 1, 5, 0), utc(2024, 1, 5, 0)),
            TimeWindow::new(utc(2024, 1, 2, 12), utc(2024, 1, 2, 18)),
        ]);
        assert_eq!(
            set.intervals(),
            &[TimeWindow::new(utc(2024, 1, 1, 0), utc(2024, 1, 3, 0))]
        );
        assert!(set.contains(utc(2024, 1, 2, 23)));
        assert!(!set.contains(utc(2024, 1, 3, 0)));
        assert!(!set.contains(utc(2023, 12, 31, 23)));
        assert!(SuppressionSet::new([]).is_empty());
    }

    #[test]
    fn test_cancel_suppresses_only_inside_window() {
        let t = utc(2024, 1, 1, 0);
        let schedefs = vec![
            schedef("cancel", '5', TriggerRule::cancel(t, Duration::hours(24)).unwrap()),
            schedef("early", '5', TriggerRule::once(t + Duration::hours(1)).unwrap()),
            schedef("late", '5', TriggerRule::once(t + Duration::hours(25)).unwrap()),
        ];

        let resolution = ScheduleResolver::resolve_detailed(&schedefs, &window());
        let ids: Vec<_> = resolution.occurrences.iter().map(|o| o.schedef.id.as_str()).collect();
        assert_eq!(ids, vec!["late"]);
        assert_eq!(resolution.suppressed.len(), 1);
        assert_eq!(resolution.suppressed[0].schedef.id, "early");
    }

    #[test]
    fn test_ordering_by_time_priority_and_id() {
        let daily = TriggerRule::days(utc(2024, 1, 1, 7), [], []).unwrap();
        let schedefs = vec![
            schedef("b", '2', daily.clone()),
            schedef("a", '2', daily.clone()),
            schedef("z", '1', daily),
        ];

        let resolved = ScheduleResolver::resolve(&schedefs, &window());
        assert_eq!(resolved.len(), 9);
        let first_day: Vec<_> = resolved[..3].iter().map(|o| o.schedef.id.as_str()).collect();
        assert_eq!(first_day, vec!["z", "a", "b"]);
        assert!(resolved.windows(2).all(|pair| pair[0].instant <= pair[1].instant));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let schedefs = vec![
            schedef("daily", '3', TriggerRule::days(utc(2024, 1, 1, 7), [], []).unwrap()),
            schedef("once", '1', TriggerRule::once(utc(2024, 1, 2, 7)).unwrap()),
            schedef("cancel", '1', TriggerRule::cancel(utc(2024, 1, 3, 0), Duration::hours(12)).unwrap()),
        ];
        let first = ScheduleResolver::resolve(&schedefs, &window());
        let second = ScheduleResolver::resolve(&schedefs, &window());
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_validity_period_filters_definitions_and_instants() {
        let daily = TriggerRule::days(utc(2024, 1, 1, 7), [], []).unwrap();
        let mut partial = schedef("partial", '5', daily.clone());
        partial.validity_period = ValidityPeriod::new(utc(2024, 1, 2, 0), utc(2024, 1, 2, 23));
        let mut ignored = schedef("ignored", '5', daily.clone());
        ignored.validity_period = ValidityPeriod::default().ignored();
        let mut expired = schedef("expired", '5', daily);
        expired.validity_period = ValidityPeriod::new(utc(2023, 1, 1, 0), utc(2023, 12, 31, 0));

        let mut ignored_cancel = schedef(
            "ignored-cancel",
            '5',
            TriggerRule::cancel(utc(2024, 1, 1, 0), Duration::days(10)).unwrap(),
        );
        ignored_cancel.validity_period = ValidityPeriod::default().ignored();

        let schedefs = vec![partial, ignored, expired, ignored_cancel];
        let resolved = ScheduleResolver::resolve(&schedefs, &window());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].idempotency_key(), ("partial", utc(2024, 1, 2, 7)));
    }

    #[test]
    fn test_zero_length_cancel_suppresses_nothing() {
        let t = utc(2024, 1, 1, 7);
        let schedefs = vec![
            schedef("cancel", '5', TriggerRule::cancel(t, Duration::zero()).unwrap()),
            schedef("once", '5', TriggerRule::once(t).unwrap()),
        ];
        assert_eq!(ScheduleResolver::resolve(&schedefs, &window()).len(), 1);
    }
}
