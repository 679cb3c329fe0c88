/// Rate-of-change accumulation over an ordered epoch sequence.
///
/// An explicit fold: the previous value vector is carried as state instead
/// of living in loop scope. Boundary epochs anchor the fold without ever
/// emitting a field; zero-months steps emit nothing but still advance the
/// anchor, so same-date duplicates can never divide by zero.
#[derive(Debug, Default)]
pub struct DifferentialAccumulator {
    prev: Option<Vec<f64>>,
    fields: Vec<(String, Vec<f64>)>,
}

impl DifferentialAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retains a pre-window boundary value as the previous-value anchor.
    pub fn anchor(&mut self, values: Vec<f64>) {
        self.prev = Some(values);
    }

    /// Feeds one in-window epoch. Emits `(value - prev) / months` under a
    /// derived tag combining the marker, the later date and the step width.
    pub fn step(&mut self, date_tag: &str, months: f64, values: Vec<f64>) {
        if months != 0.0
            && let Some(prev) = &self.prev
        {
            let rate: Vec<f64> = values
                .iter()
                .zip(prev)
                .map(|(v, p)| (v - p) / months)
                .collect();
            self.fields.push((format!("D{date_tag}({months})"), rate));
        }
        self.prev = Some(values);
    }

    /// The derived rate fields, in emission order.
    pub fn into_fields(self) -> Vec<(String, Vec<f64>)> {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_between_consecutive_epochs() {
        let mut acc = DifferentialAccumulator::new();
        acc.step("A20140101", 0.0, vec![10.0, 20.0]);
        acc.step("A20140301", 2.0, vec![14.0, 18.0]);
        acc.step("A20140401", 1.0, vec![15.0, 18.0]);

        let fields = acc.into_fields();
        assert_eq!(fields.len(), 2);

        let (name, rate) = &fields[0];
        assert_eq!(name, "DA20140301(2)");
        assert_eq!(rate, &[2.0, -1.0]);

        let (name, rate) = &fields[1];
        assert_eq!(name, "DA20140401(1)");
        assert_eq!(rate, &[1.0, 0.0]);
    }

    #[test]
    fn test_boundary_anchor_is_never_emitted() {
        let mut acc = DifferentialAccumulator::new();
        acc.anchor(vec![5.0]);
        acc.step("A20140701", 6.0, vec![11.0]);

        let fields = acc.into_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].1, &[1.0]);
    }

    #[test]
    fn test_zero_months_step_emits_nothing() {
        let mut acc = DifferentialAccumulator::new();
        acc.step("A20140101", 0.0, vec![1.0]);
        // Duplicate date: zero delta, silently dropped rather than zeroed
        acc.step("A20140101", 0.0, vec![9.0]);
        acc.step("A20140201", 1.0, vec![10.0]);

        let fields = acc.into_fields();
        assert_eq!(fields.len(), 1);
        // The anchor still advanced through the duplicate
        assert_eq!(fields[0].1, &[1.0]);
    }

    #[test]
    fn test_first_epoch_without_anchor_emits_nothing() {
        let mut acc = DifferentialAccumulator::new();
        acc.step("A20140701", 5.9, vec![3.0]);

        assert!(acc.into_fields().is_empty());
    }

    #[test]
    fn test_nan_samples_propagate_into_rates() {
        let mut acc = DifferentialAccumulator::new();
        acc.anchor(vec![1.0, f64::NAN]);
        acc.step("A20140201", 1.0, vec![2.0, 5.0]);

        let fields = acc.into_fields();
        assert_eq!(fields[0].1[0], 1.0);
        assert!(fields[0].1[1].is_nan());
    }
}
