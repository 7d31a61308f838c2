use uuid::Uuid;

use crate::error::Result;
use crate::pool::EvidenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Fragment,
    Claim,
}

impl TargetType {
    fn as_str(self) -> &'static str {
        match self {
            TargetType::Fragment => "fragment",
            TargetType::Claim => "claim",
        }
    }
}

fn to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("chunks_exact(4) guarantees length")))
        .collect()
}

impl EvidenceStore {
    /// `put_embedding`: unique on `(target_type, target_id, model_id)`
    /// (spec 4.14).
    pub async fn put_embedding(
        &self,
        target_type: TargetType,
        target_id: Uuid,
        model_id: &str,
        vector: &[f32],
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO embeddings (target_type, target_id, model_id, blob, dimension) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(target_type, target_id, model_id) DO UPDATE SET blob = excluded.blob, dimension = excluded.dimension",
        )
        .bind(target_type.as_str())
        .bind(target_id.to_string())
        .bind(model_id)
        .bind(to_bytes(vector))
        .bind(vector.len() as i64)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_embedding(&self, target_type: TargetType, target_id: Uuid, model_id: &str) -> Result<Option<Vec<f32>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(
            "SELECT blob FROM embeddings WHERE target_type = ? AND target_id = ? AND model_id = ?",
        )
        .bind(target_type.as_str())
        .bind(target_id.to_string())
        .bind(model_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(bytes,)| from_bytes(&bytes)))
    }
}
