use crate::models::{DerivedRecord, StudentRecord};

/// Share of recorded days the student was present. A record with no
/// attendance data at all has a rate of zero.
pub fn attendance_rate(present_days: u32, absent_days: u32) -> f64 {
    let total = u64::from(present_days) + u64::from(absent_days);
    if total == 0 {
        return 0.0;
    }
    present_days as f64 / total as f64
}

pub fn derive(record: StudentRecord) -> DerivedRecord {
    let attendance_rate = attendance_rate(record.present_days, record.absent_days);
    DerivedRecord {
        record,
        attendance_rate,
    }
}
