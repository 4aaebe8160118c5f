//! Descriptive digest of one cluster, used to explain it.

use arrayvec::ArrayVec;
use blunderscope_evaluator::features::CategoricalField;
use blunderscope_stats::{descriptive::DescriptiveStats, frequency::FrequencyTable};
use serde::Serialize;

use crate::model::MistakeRecord;

/// Most frequent levels reported per field.
pub const TOP_LEVELS: usize = 3;

/// Fields described in every summary.
pub const SUMMARY_FIELDS: [CategoricalField; 4] = [
    CategoricalField::MistakeType,
    CategoricalField::GamePhase,
    CategoricalField::PieceMoved,
    CategoricalField::MistakeCategory,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelCount {
    pub level: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    pub field: CategoricalField,
    /// Descending by count; ties follow level declaration order.
    pub top: ArrayVec<LevelCount, TOP_LEVELS>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub total_mistakes: usize,
    pub avg_cpl: f64,
    pub most_severe_cpl: u32,
    pub fields: Vec<FieldSummary>,
}

/// Summarizes the given cluster members. Returns `None` for an empty cluster.
///
/// ```
/// use blunderscope_analysis::summary::summarize;
///
/// assert!(summarize(&[]).is_none());
/// ```
#[must_use]
pub fn summarize(members: &[&MistakeRecord]) -> Option<ClusterSummary> {
    let cpl = DescriptiveStats::new(members.iter().map(|m| f64::from(m.cpl)))?;
    let most_severe_cpl = members.iter().map(|m| m.cpl).max()?;

    let fields = SUMMARY_FIELDS
        .iter()
        .map(|&field| {
            let levels = field.levels();
            let table = FrequencyTable::new(
                levels.len(),
                members.iter().map(|m| m.features.level_index(field)),
            );
            let top = table
                .top(TOP_LEVELS)
                .into_iter()
                .map(|(level, count)| LevelCount {
                    level: levels[level],
                    count,
                })
                .collect();
            FieldSummary { field, top }
        })
        .collect();

    Some(ClusterSummary {
        total_mistakes: members.len(),
        avg_cpl: cpl.mean,
        most_severe_cpl,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use blunderscope_engine::PieceKind;

    use super::*;
    use crate::testing::record;

    #[test]
    fn test_summary() {
        let mut records = (0..7)
            .map(|i| record(i, 100 + 20 * u32::try_from(i).unwrap(), 20))
            .collect::<Vec<_>>();
        let pieces = [
            PieceKind::Queen,
            PieceKind::Rook,
            PieceKind::Queen,
            PieceKind::Pawn,
            PieceKind::Knight,
            PieceKind::Rook,
            PieceKind::Queen,
        ];
        for (record, piece) in records.iter_mut().zip(pieces) {
            record.features.piece_moved = piece;
        }
        let members = records.iter().collect::<Vec<_>>();

        let summary = summarize(&members).unwrap();
        assert_eq!(summary.total_mistakes, 7);
        assert!((summary.avg_cpl - 160.0).abs() < 1e-9);
        assert_eq!(summary.most_severe_cpl, 220);

        let pieces = &summary.fields[2];
        assert_eq!(pieces.field, CategoricalField::PieceMoved);
        let top = pieces
            .top
            .iter()
            .map(|c| (c.level, c.count))
            .collect::<Vec<_>>();
        // Pawn and Knight tie at one; Pawn is declared first
        assert_eq!(top, [("Queen", 3), ("Rook", 2), ("Pawn", 1)]);

        for field in &summary.fields {
            assert!(field.top.iter().all(|c| c.count <= summary.total_mistakes));
            assert!(field.top.windows(2).all(|w| w[0].count >= w[1].count));
        }

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["fields"][2]["field"], "piece_moved");
        assert_eq!(json["fields"][0]["top"][0]["level"], "Mistake");
    }
}
