use qdrant_client::{
	client::Payload,
	qdrant::{
		CreateCollectionBuilder, Distance, PointId, PointStruct, Query, QueryPointsBuilder,
		UpsertPointsBuilder, VectorParamsBuilder, point_id::PointIdOptions,
	},
};
use uuid::Uuid;

use crate::Result;

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &moneta_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		let create = CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
			VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
		);

		self.client.create_collection(create).await?;

		Ok(())
	}

	/// Point id is the transaction id; payload stays empty since postgres is
	/// hydrated afterwards anyway.
	pub async fn upsert_point(&self, transaction_id: Uuid, vector: Vec<f32>) -> Result<()> {
		let point = PointStruct::new(transaction_id.to_string(), vector, Payload::new());
		let upsert = UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	/// Transaction ids of the `limit` nearest points by cosine distance, in
	/// the index's ranking order.
	pub async fn nearest(&self, vector: Vec<f32>, limit: u64) -> Result<Vec<Uuid>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.limit(limit);
		let response = self.client.query(search).await?;

		Ok(response
			.result
			.into_iter()
			.filter_map(|point| point.id.as_ref().and_then(point_id_to_uuid))
			.collect())
	}
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match point_id.point_id_options.as_ref()? {
		PointIdOptions::Uuid(raw) => Uuid::parse_str(raw).ok(),
		PointIdOptions::Num(_) => None,
	}
}
