#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin harvesting from the current cursor.
    Start,
    /// The fetch issued for the current cursor returned this batch.
    BatchFetched(Vec<crate::OrderFilledEvent>),
    /// The store accepted an appended batch.
    BatchAppended { records: usize },
    /// Stop before the next fetch.
    Cancel,
    /// Acknowledges an effect that produces no state change, such as `Report`.
    NoOp,
}
