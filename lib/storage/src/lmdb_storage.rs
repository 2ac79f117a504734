// LMDB-backed catalog and similarity storage
use catalogx_core::{
    normalize, validate_score, Category, CategoryId, Error, Product, ProductDraft, ProductId,
    Result, SimilarityRecord, Tag, TagId,
};
use heed::byteorder::BE;
use heed::types::{Bytes, Str, Unit, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::store::{CatalogStore, SimilarityStore, SimilarityTxn, StorageResultExt};

const DB_CATEGORIES: &str = "categories";
const DB_TAGS: &str = "tags";
const DB_PRODUCTS: &str = "products";
const DB_SIMILARITIES: &str = "similarities";
const DB_SIMILARITY_PEERS: &str = "similarity_peers";
const DB_SEQUENCES: &str = "sequences";

const SEQ_CATEGORY: &str = "category";
const SEQ_TAG: &str = "tag";
const SEQ_PRODUCT: &str = "product";

/// 10GB default map size
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024 * 1024;

type EntityDb = Database<U64<BE>, Bytes>;

/// Two big-endian ids; lexicographic byte order equals numeric pair order.
type PairKey = [u8; 16];

#[inline]
fn pair_key(first: ProductId, second: ProductId) -> PairKey {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&first.to_be_bytes());
    key[8..].copy_from_slice(&second.to_be_bytes());
    key
}

#[inline]
fn peer_from_key(key: &[u8]) -> Result<ProductId> {
    let bytes: [u8; 8] = key
        .get(8..16)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::Storage(format!("malformed peer key of {} bytes", key.len())))?;
    Ok(ProductId::from_be_bytes(bytes))
}

#[inline]
fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).serialization()
}

#[inline]
fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).serialization()
}

/// Durable store on top of LMDB.
///
/// Similarity records live in `similarities`, keyed by the canonical
/// `(low, high)` pair, so the key itself enforces uniqueness. The
/// `similarity_peers` database holds both orientations `(member, peer)` and
/// serves `find_all_involving` with a prefix scan. LMDB admits one write
/// transaction at a time, which makes every read-then-write below atomic.
pub struct LmdbStorage {
    env: Arc<Env>,
    categories_db: EntityDb,
    tags_db: EntityDb,
    products_db: EntityDb,
    similarities_db: Database<Bytes, Bytes>,
    peers_db: Database<Bytes, Unit>,
    sequences_db: Database<Str, U64<BE>>,
}

impl LmdbStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn with_map_size<P: AsRef<Path>>(path: P, map_size: usize) -> Result<Self> {
        std::fs::create_dir_all(&path)?;

        let env = Arc::new(unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(10)
                .open(path.as_ref())
                .storage()?
        });

        let mut wtxn = env.write_txn().storage()?;

        let categories_db = env
            .create_database(&mut wtxn, Some(DB_CATEGORIES))
            .storage()?;
        let tags_db = env.create_database(&mut wtxn, Some(DB_TAGS)).storage()?;
        let products_db = env
            .create_database(&mut wtxn, Some(DB_PRODUCTS))
            .storage()?;
        let similarities_db = env
            .create_database(&mut wtxn, Some(DB_SIMILARITIES))
            .storage()?;
        let peers_db = env
            .create_database(&mut wtxn, Some(DB_SIMILARITY_PEERS))
            .storage()?;
        let sequences_db = env
            .create_database(&mut wtxn, Some(DB_SEQUENCES))
            .storage()?;

        wtxn.commit().storage()?;

        info!("Opened LMDB storage at {:?}", path.as_ref());

        Ok(Self {
            env,
            categories_db,
            tags_db,
            products_db,
            similarities_db,
            peers_db,
            sequences_db,
        })
    }

    fn next_id(&self, wtxn: &mut RwTxn, sequence: &str) -> Result<u64> {
        let next = self.sequences_db.get(wtxn, sequence).storage()?.unwrap_or(0) + 1;
        self.sequences_db.put(wtxn, sequence, &next).storage()?;
        Ok(next)
    }

    fn get_entity<T: DeserializeOwned>(&self, txn: &RoTxn, db: EntityDb, id: u64) -> Result<Option<T>> {
        match db.get(txn, &id).storage()? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn list_entities<T: DeserializeOwned>(&self, db: EntityDb) -> Result<Vec<T>> {
        let rtxn = self.env.read_txn().storage()?;
        let mut entities = Vec::new();
        for result in db.iter(&rtxn).storage()? {
            let (_, bytes) = result.storage()?;
            entities.push(decode(bytes)?);
        }
        Ok(entities)
    }

    fn check_references(&self, txn: &RoTxn, draft: &ProductDraft) -> Result<()> {
        if self.categories_db.get(txn, &draft.category).storage()?.is_none() {
            return Err(Error::CategoryNotFound(draft.category));
        }
        for tag in &draft.tags {
            if self.tags_db.get(txn, tag).storage()?.is_none() {
                return Err(Error::TagNotFound(*tag));
            }
        }
        Ok(())
    }

    fn read_record(&self, txn: &RoTxn, low: ProductId, high: ProductId) -> Result<Option<SimilarityRecord>> {
        read_record(self.similarities_db, txn, low, high)
    }
}

fn read_record(
    db: Database<Bytes, Bytes>,
    txn: &RoTxn,
    low: ProductId,
    high: ProductId,
) -> Result<Option<SimilarityRecord>> {
    match db.get(txn, &pair_key(low, high)).storage()? {
        Some(bytes) => Ok(Some(decode(bytes)?)),
        None => Ok(None),
    }
}

impl CatalogStore for LmdbStorage {
    fn insert_category(&self, name: &str) -> Result<Category> {
        catalogx_core::product::validate_name(name)?;
        let mut wtxn = self.env.write_txn().storage()?;
        let category = Category {
            id: self.next_id(&mut wtxn, SEQ_CATEGORY)?,
            name: name.to_string(),
        };
        self.categories_db
            .put(&mut wtxn, &category.id, &encode(&category)?)
            .storage()?;
        wtxn.commit().storage()?;
        Ok(category)
    }

    fn get_category(&self, id: CategoryId) -> Result<Category> {
        let rtxn = self.env.read_txn().storage()?;
        self.get_entity(&rtxn, self.categories_db, id)?
            .ok_or(Error::CategoryNotFound(id))
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        self.list_entities(self.categories_db)
    }

    fn insert_tag(&self, name: &str) -> Result<Tag> {
        catalogx_core::product::validate_name(name)?;
        let mut wtxn = self.env.write_txn().storage()?;
        let tag = Tag {
            id: self.next_id(&mut wtxn, SEQ_TAG)?,
            name: name.to_string(),
        };
        self.tags_db.put(&mut wtxn, &tag.id, &encode(&tag)?).storage()?;
        wtxn.commit().storage()?;
        Ok(tag)
    }

    fn get_tag(&self, id: TagId) -> Result<Tag> {
        let rtxn = self.env.read_txn().storage()?;
        self.get_entity(&rtxn, self.tags_db, id)?
            .ok_or(Error::TagNotFound(id))
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        self.list_entities(self.tags_db)
    }

    fn insert_product(&self, draft: ProductDraft) -> Result<Product> {
        let draft = draft.validate()?;
        let mut wtxn = self.env.write_txn().storage()?;
        self.check_references(&wtxn, &draft)?;

        let product = Product::from_draft(self.next_id(&mut wtxn, SEQ_PRODUCT)?, draft);
        self.products_db
            .put(&mut wtxn, &product.id, &encode(&product)?)
            .storage()?;
        wtxn.commit().storage()?;
        Ok(product)
    }

    fn update_product(&self, id: ProductId, draft: ProductDraft) -> Result<Product> {
        let draft = draft.validate()?;
        let mut wtxn = self.env.write_txn().storage()?;
        if self.products_db.get(&wtxn, &id).storage()?.is_none() {
            return Err(Error::ProductNotFound(id));
        }
        self.check_references(&wtxn, &draft)?;

        let product = Product::from_draft(id, draft);
        self.products_db
            .put(&mut wtxn, &id, &encode(&product)?)
            .storage()?;
        wtxn.commit().storage()?;
        Ok(product)
    }

    fn get_product(&self, id: ProductId) -> Result<Product> {
        let rtxn = self.env.read_txn().storage()?;
        self.get_entity(&rtxn, self.products_db, id)?
            .ok_or(Error::ProductNotFound(id))
    }

    fn list_products(&self) -> Result<Vec<Product>> {
        self.list_entities(self.products_db)
    }

    fn remove_product(&self, id: ProductId) -> Result<bool> {
        let mut wtxn = self.env.write_txn().storage()?;
        let existed = self.products_db.delete(&mut wtxn, &id).storage()?;
        wtxn.commit().storage()?;
        Ok(existed)
    }
}

impl LmdbStorage {
    /// Get-or-create of one canonical pair inside an open write transaction.
    fn get_or_insert(
        &self,
        wtxn: &mut RwTxn,
        low: ProductId,
        high: ProductId,
        default_score: f64,
    ) -> Result<(SimilarityRecord, bool)> {
        if let Some(existing) = self.read_record(wtxn, low, high)? {
            return Ok((existing, false));
        }

        let record = SimilarityRecord::new(low, high, default_score);
        self.similarities_db
            .put(wtxn, &pair_key(low, high), &encode(&record)?)
            .storage()?;
        self.peers_db.put(wtxn, &pair_key(low, high), &()).storage()?;
        self.peers_db.put(wtxn, &pair_key(high, low), &()).storage()?;
        Ok((record, true))
    }
}

impl SimilarityStore for LmdbStorage {
    fn upsert_default(
        &self,
        a: ProductId,
        b: ProductId,
        default_score: f64,
    ) -> Result<(SimilarityRecord, bool)> {
        let (low, high) = normalize(a, b)?;
        validate_score(default_score)?;

        let mut wtxn = self.env.write_txn().storage()?;
        let (record, created) = self.get_or_insert(&mut wtxn, low, high, default_score)?;
        if created {
            wtxn.commit().storage()?;
            debug!(low, high, score = default_score, "Created similarity record");
        }
        Ok((record, created))
    }

    fn upsert_linked(
        &self,
        a: ProductId,
        b: ProductId,
        default_score: f64,
    ) -> Result<(SimilarityRecord, bool)> {
        let (low, high) = normalize(a, b)?;
        validate_score(default_score)?;

        let mut wtxn = self.env.write_txn().storage()?;
        for id in [low, high] {
            if self.products_db.get(&wtxn, &id).storage()?.is_none() {
                return Err(Error::ProductNotFound(id));
            }
        }
        let (record, created) = self.get_or_insert(&mut wtxn, low, high, default_score)?;
        if created {
            wtxn.commit().storage()?;
            debug!(low, high, score = default_score, "Linked products");
        }
        Ok((record, created))
    }

    fn upsert_default_many(
        &self,
        pairs: &[(ProductId, ProductId)],
        default_score: f64,
    ) -> Result<Vec<Result<bool>>> {
        let mut wtxn = self.env.write_txn().storage()?;
        let mut outcomes = Vec::with_capacity(pairs.len());
        for &(a, b) in pairs {
            let pair = normalize(a, b).and_then(|pair| validate_score(default_score).map(|()| pair));
            outcomes.push(match pair {
                // A failed put leaves the transaction unusable, so it fails the batch
                Ok((low, high)) => Ok(self.get_or_insert(&mut wtxn, low, high, default_score)?.1),
                Err(e) => Err(e),
            });
        }
        wtxn.commit().storage()?;

        debug!(pairs = pairs.len(), "Seeded similarity batch");
        Ok(outcomes)
    }

    fn find_between(&self, a: ProductId, b: ProductId) -> Result<SimilarityRecord> {
        let (low, high) = normalize(a, b)?;
        let rtxn = self.env.read_txn().storage()?;
        self.read_record(&rtxn, low, high)?
            .ok_or(Error::SimilarityNotFound { low, high })
    }

    fn find_all_involving(&self, product: ProductId) -> Result<Vec<SimilarityRecord>> {
        let rtxn = self.env.read_txn().storage()?;
        let mut records = Vec::new();
        for result in self
            .peers_db
            .prefix_iter(&rtxn, &product.to_be_bytes()[..])
            .storage()?
        {
            let (key, ()) = result.storage()?;
            let peer = peer_from_key(key)?;
            let (low, high) = normalize(product, peer)?;
            let record = self
                .read_record(&rtxn, low, high)?
                .ok_or_else(|| Error::Storage(format!("peer index points at missing pair ({}, {})", low, high)))?;
            records.push(record);
        }
        Ok(records)
    }

    fn delete_all_involving(&self, product: ProductId) -> Result<usize> {
        let mut wtxn = self.env.write_txn().storage()?;

        let mut peers = Vec::new();
        for result in self
            .peers_db
            .prefix_iter(&wtxn, &product.to_be_bytes()[..])
            .storage()?
        {
            let (key, ()) = result.storage()?;
            peers.push(peer_from_key(key)?);
        }

        for peer in &peers {
            let (low, high) = normalize(product, *peer)?;
            self.similarities_db
                .delete(&mut wtxn, &pair_key(low, high))
                .storage()?;
            self.peers_db.delete(&mut wtxn, &pair_key(product, *peer)).storage()?;
            self.peers_db.delete(&mut wtxn, &pair_key(*peer, product)).storage()?;
        }
        wtxn.commit().storage()?;

        debug!(product, removed = peers.len(), "Deleted similarity records");
        Ok(peers.len())
    }

    fn count(&self) -> Result<usize> {
        let rtxn = self.env.read_txn().storage()?;
        let len = self.similarities_db.len(&rtxn).storage()?;
        Ok(len as usize)
    }

    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn SimilarityTxn) -> Result<T>,
    {
        let mut txn = LmdbTxn {
            similarities_db: self.similarities_db,
            wtxn: self.env.write_txn().storage()?,
        };
        let value = f(&mut txn)?;
        txn.wtxn.commit().storage()?;
        Ok(value)
    }
}

/// Write transaction over the similarities database. Dropped without commit
/// when the closure fails, which aborts every staged write.
struct LmdbTxn<'e> {
    similarities_db: Database<Bytes, Bytes>,
    wtxn: RwTxn<'e>,
}

impl SimilarityTxn for LmdbTxn<'_> {
    fn find_between(&mut self, a: ProductId, b: ProductId) -> Result<SimilarityRecord> {
        let (low, high) = normalize(a, b)?;
        read_record(self.similarities_db, &self.wtxn, low, high)?
            .ok_or(Error::SimilarityNotFound { low, high })
    }

    fn save(&mut self, record: SimilarityRecord) -> Result<SimilarityRecord> {
        let record = record.normalized()?;
        let (low, high) = record.pair();
        if read_record(self.similarities_db, &self.wtxn, low, high)?.is_none() {
            return Err(Error::SimilarityNotFound { low, high });
        }
        self.similarities_db
            .put(&mut self.wtxn, &pair_key(low, high), &encode(&record)?)
            .storage()?;
        Ok(record)
    }
}
