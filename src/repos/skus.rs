//! SKU master-data repository.

use rusqlite::{params, Connection, Row};
use tracing::debug;

use crate::errors::{DomainError, DomainResult};
use crate::models::{DemandVariability, OosPopupPreference, Sku, WastePenaltyMode};
use crate::storage::{Database, TxBehavior};

const SKU_COLUMNS: &str = "sku, description, ean, category, department, in_assortment, \
     moq, pack_size, lead_time_days, review_period_days, safety_stock, reorder_point, \
     max_stock, shelf_life_days, min_shelf_life_days, waste_penalty_mode, \
     waste_penalty_factor, waste_risk_threshold, demand_variability, target_csl, \
     forecast_method, mc_distribution, mc_n_simulations, mc_random_seed, mc_output_stat, \
     mc_output_percentile, mc_horizon_mode, mc_horizon_days, oos_popup_preference";

pub struct SkuRepo {
    db: Database,
}

impl SkuRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    /// Insert if absent, update otherwise. `created_at` is preserved on
    /// update; `updated_at` always refreshes.
    pub fn upsert(&self, sku: &Sku) -> DomainResult<()> {
        sku.validate()?;
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            let existed = Self::get_in(conn, &sku.sku)?.is_some();
            Self::upsert_in(conn, sku)?;
            crate::repos::AuditRepo::append_in(
                conn,
                if existed { "SKU_UPDATED" } else { "SKU_CREATED" },
                "system",
                Some(&sku.sku),
                &sku.description,
                None,
            )?;
            Ok(())
        })
    }

    pub(crate) fn upsert_in(conn: &Connection, sku: &Sku) -> DomainResult<()> {
        conn.execute(
            "INSERT INTO skus (sku, description, ean, category, department, in_assortment,
                 moq, pack_size, lead_time_days, review_period_days, safety_stock,
                 reorder_point, max_stock, shelf_life_days, min_shelf_life_days,
                 waste_penalty_mode, waste_penalty_factor, waste_risk_threshold,
                 demand_variability, target_csl, forecast_method, mc_distribution,
                 mc_n_simulations, mc_random_seed, mc_output_stat, mc_output_percentile,
                 mc_horizon_mode, mc_horizon_days, oos_popup_preference)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)
             ON CONFLICT(sku) DO UPDATE SET
                 description = excluded.description,
                 ean = excluded.ean,
                 category = excluded.category,
                 department = excluded.department,
                 in_assortment = excluded.in_assortment,
                 moq = excluded.moq,
                 pack_size = excluded.pack_size,
                 lead_time_days = excluded.lead_time_days,
                 review_period_days = excluded.review_period_days,
                 safety_stock = excluded.safety_stock,
                 reorder_point = excluded.reorder_point,
                 max_stock = excluded.max_stock,
                 shelf_life_days = excluded.shelf_life_days,
                 min_shelf_life_days = excluded.min_shelf_life_days,
                 waste_penalty_mode = excluded.waste_penalty_mode,
                 waste_penalty_factor = excluded.waste_penalty_factor,
                 waste_risk_threshold = excluded.waste_risk_threshold,
                 demand_variability = excluded.demand_variability,
                 target_csl = excluded.target_csl,
                 forecast_method = excluded.forecast_method,
                 mc_distribution = excluded.mc_distribution,
                 mc_n_simulations = excluded.mc_n_simulations,
                 mc_random_seed = excluded.mc_random_seed,
                 mc_output_stat = excluded.mc_output_stat,
                 mc_output_percentile = excluded.mc_output_percentile,
                 mc_horizon_mode = excluded.mc_horizon_mode,
                 mc_horizon_days = excluded.mc_horizon_days,
                 oos_popup_preference = excluded.oos_popup_preference,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![
                sku.sku,
                sku.description,
                sku.ean,
                sku.category,
                sku.department,
                sku.in_assortment as i64,
                sku.moq,
                sku.pack_size,
                sku.lead_time_days,
                sku.review_period_days,
                sku.safety_stock,
                sku.reorder_point,
                sku.max_stock,
                sku.shelf_life_days,
                sku.min_shelf_life_days,
                sku.waste_penalty_mode.as_str(),
                sku.waste_penalty_factor,
                sku.waste_risk_threshold,
                sku.demand_variability.map(|v| v.as_str()),
                sku.target_csl,
                sku.forecast_method,
                sku.mc_distribution,
                sku.mc_n_simulations,
                sku.mc_random_seed,
                sku.mc_output_stat,
                sku.mc_output_percentile,
                sku.mc_horizon_mode,
                sku.mc_horizon_days,
                sku.oos_popup_preference.as_str(),
            ],
        )?;
        debug!(sku = %sku.sku, "sku upserted");
        Ok(())
    }

    pub fn get(&self, sku: &str) -> DomainResult<Option<Sku>> {
        self.db.with_conn(|conn| Self::get_in(conn, sku))
    }

    pub(crate) fn get_in(conn: &Connection, sku: &str) -> DomainResult<Option<Sku>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM skus WHERE sku = ?1",
            SKU_COLUMNS
        ))?;
        let mut rows = stmt.query([sku])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_sku(row)?)),
            None => Ok(None),
        }
    }

    /// Fetch or fail with NotFound.
    pub fn require(&self, sku: &str) -> DomainResult<Sku> {
        self.get(sku)?
            .ok_or_else(|| DomainError::not_found("sku", sku))
    }

    pub fn list_active(&self) -> DomainResult<Vec<Sku>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM skus WHERE in_assortment = 1 ORDER BY sku",
                SKU_COLUMNS
            ))?;
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_sku(row)?);
            }
            Ok(out)
        })
    }

    pub fn list_all(&self) -> DomainResult<Vec<Sku>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(&format!("SELECT {} FROM skus ORDER BY sku", SKU_COLUMNS))?;
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_sku(row)?);
            }
            Ok(out)
        })
    }

    /// Soft delete / restore.
    pub fn toggle_assortment(&self, sku: &str, in_assortment: bool) -> DomainResult<()> {
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            let changed = conn.execute(
                "UPDATE skus SET in_assortment = ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE sku = ?2",
                params![in_assortment as i64, sku],
            )?;
            if changed == 0 {
                return Err(DomainError::not_found("sku", sku));
            }
            crate::repos::AuditRepo::append_in(
                conn,
                "SKU_UPDATED",
                "system",
                Some(sku),
                &format!("in_assortment = {}", in_assortment),
                None,
            )?;
            Ok(())
        })
    }

    /// Hard delete. RESTRICT on the ledger surfaces as ForeignKey when any
    /// transactions reference the SKU.
    pub fn delete(&self, sku: &str) -> DomainResult<()> {
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            let changed = conn.execute("DELETE FROM skus WHERE sku = ?1", [sku])?;
            if changed == 0 {
                return Err(DomainError::not_found("sku", sku));
            }
            crate::repos::AuditRepo::append_in(conn, "SKU_DELETED", "system", Some(sku), "", None)?;
            Ok(())
        })
    }
}

fn row_to_sku(row: &Row) -> DomainResult<Sku> {
    let variability: Option<String> = row.get(18)?;
    let penalty_mode: String = row.get(15)?;
    let popup: String = row.get(28)?;
    Ok(Sku {
        sku: row.get(0)?,
        description: row.get(1)?,
        ean: row.get(2)?,
        category: row.get(3)?,
        department: row.get(4)?,
        in_assortment: row.get::<_, i64>(5)? != 0,
        moq: row.get(6)?,
        pack_size: row.get(7)?,
        lead_time_days: row.get(8)?,
        review_period_days: row.get(9)?,
        safety_stock: row.get(10)?,
        reorder_point: row.get(11)?,
        max_stock: row.get(12)?,
        shelf_life_days: row.get(13)?,
        min_shelf_life_days: row.get(14)?,
        waste_penalty_mode: WastePenaltyMode::parse(&penalty_mode),
        waste_penalty_factor: row.get(16)?,
        waste_risk_threshold: row.get(17)?,
        demand_variability: variability.as_deref().and_then(DemandVariability::parse),
        target_csl: row.get(19)?,
        forecast_method: row.get(20)?,
        mc_distribution: row.get(21)?,
        mc_n_simulations: row.get(22)?,
        mc_random_seed: row.get(23)?,
        mc_output_stat: row.get(24)?,
        mc_output_percentile: row.get(25)?,
        mc_horizon_mode: row.get(26)?,
        mc_horizon_days: row.get(27)?,
        oos_popup_preference: OosPopupPreference::parse(&popup),
    })
}
