use crate::{
    process::{RunReport, SourceOutput},
    record::CanonicalRecord,
};

/// All surviving records of a run plus the combined counters.
#[derive(Debug, Default)]
pub struct MergedRun {
    pub records: Vec<CanonicalRecord>,
    pub report: RunReport,
}

/// Concatenate per-source outputs. Row order inside a source is kept; order
/// across sources carries no meaning. Duplicates across overlapping exports
/// are left alone.
pub fn merge(outputs: Vec<SourceOutput>) -> MergedRun {
    let total = outputs.iter().map(|o| o.records.len()).sum();
    let mut merged = MergedRun {
        records: Vec::with_capacity(total),
        report: RunReport::default(),
    };
    for output in outputs {
        merged.report.absorb(&output.source.name, &output.report);
        merged.records.extend(output.records);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{process::SourceReport, record::SourceDescriptor};
    use chrono::NaiveDate;

    fn record(km: f64, day: u32) -> CanonicalRecord {
        CanonicalRecord {
            concessionaire: Some("ViaOeste".into()),
            highway: Some("SP 280".into()),
            km,
            direction: None,
            accident_class: None,
            accident_type: None,
            cause: None,
            weather: None,
            visibility: None,
            vehicle: None,
            lane_type: None,
            latitude: None,
            longitude: None,
            occurred_at: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            fatalities: 0,
        }
    }

    fn output(name: &str, records: Vec<CanonicalRecord>) -> SourceOutput {
        let report = SourceReport {
            rows_read: records.len() + 1,
            rows_kept: records.len(),
            dropped_missing_date: 1,
            ..SourceReport::default()
        };
        SourceOutput {
            source: SourceDescriptor::from_path(name),
            records,
            report,
        }
    }

    fn sorted(mut records: Vec<CanonicalRecord>) -> Vec<String> {
        let mut keys: Vec<String> = records.drain(..).map(|r| format!("{:?}", r)).collect();
        keys.sort();
        keys
    }

    #[test]
    fn order_within_source_is_kept() {
        let a = output("a_2024.csv", vec![record(1.0, 1), record(2.0, 2), record(3.0, 3)]);
        let merged = merge(vec![a]);
        let kms: Vec<f64> = merged.records.iter().map(|r| r.km).collect();
        assert_eq!(kms, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn merge_is_order_independent_as_a_set() {
        let a = || output("a_2023.csv", vec![record(1.0, 1), record(2.0, 2)]);
        let b = || output("b_2024.csv", vec![record(9.0, 9), record(1.0, 1)]);

        let ab = merge(vec![a(), b()]);
        let ba = merge(vec![b(), a()]);
        assert_eq!(ab.records.len(), 4);
        assert_eq!(sorted(ab.records), sorted(ba.records));
        assert_eq!(ab.report.rows_kept, ba.report.rows_kept);
        assert_eq!(ab.report.dropped_missing_date, 2);
        assert_eq!(ab.report.sources_processed, 2);
    }

    #[test]
    fn duplicates_survive() {
        let merged = merge(vec![
            output("x_2023.csv", vec![record(5.0, 5)]),
            output("y_2024.csv", vec![record(5.0, 5)]),
        ]);
        assert_eq!(merged.records.len(), 2);
    }
}
