//! Iraqi and international geography used for shipping.

use sqlx::PgPool;

use momtazchem_core::{CityId, CountryId, InternationalCityId, ProvinceId};

use super::{RepositoryError, require_affected};
use crate::models::logistics::{
    City, CityInput, InternationalCity, InternationalCityInput, InternationalCountry,
    InternationalCountryInput, Province, ProvinceInput,
};

const PROVINCE_COLUMNS: &str = "id, name_arabic, name_english, name_kurdish, capital, is_active";

const CITY_SELECT: &str = r"
    SELECT c.id, c.province_id, p.name_english AS province_name, c.name_arabic,
           c.name_english, c.name_kurdish, c.distance_from_erbil_km,
           c.is_province_capital, c.is_active
    FROM iraqi_cities c
    JOIN iraqi_provinces p ON p.id = c.province_id
";

const COUNTRY_COLUMNS: &str =
    "id, name_english, name_local, country_code, currency, shipping_zone, customs_info, is_active";

const INTL_CITY_COLUMNS: &str =
    "id, country_id, name_english, name_local, distance_km, customs_info, is_active";

/// Repository for provinces, cities and international destinations.
pub struct GeographyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GeographyRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Provinces
    // =========================================================================

    /// Provinces, optionally only active ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn provinces(&self, active_only: bool) -> Result<Vec<Province>, RepositoryError> {
        let rows = sqlx::query_as::<_, Province>(&format!(
            "SELECT {PROVINCE_COLUMNS} FROM iraqi_provinces WHERE (is_active OR NOT $1) ORDER BY name_english"
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a province.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the English name exists.
    pub async fn create_province(&self, input: &ProvinceInput) -> Result<Province, RepositoryError> {
        let row = sqlx::query_as::<_, Province>(&format!(
            r"
            INSERT INTO iraqi_provinces (name_arabic, name_english, name_kurdish, capital, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PROVINCE_COLUMNS}
            "
        ))
        .bind(&input.name_arabic)
        .bind(&input.name_english)
        .bind(input.name_kurdish.as_deref())
        .bind(input.capital.as_deref())
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "province already exists"))?;

        Ok(row)
    }

    /// Replace a province.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the province does not exist.
    pub async fn update_province(
        &self,
        id: ProvinceId,
        input: &ProvinceInput,
    ) -> Result<Province, RepositoryError> {
        sqlx::query_as::<_, Province>(&format!(
            r"
            UPDATE iraqi_provinces
            SET name_arabic = $2, name_english = $3, name_kurdish = $4, capital = $5, is_active = $6
            WHERE id = $1
            RETURNING {PROVINCE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.name_arabic)
        .bind(&input.name_english)
        .bind(input.name_kurdish.as_deref())
        .bind(input.capital.as_deref())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "province already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a province and its cities.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the province does not exist.
    pub async fn delete_province(&self, id: ProvinceId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM iraqi_provinces WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }

    /// Insert a province by English name or return the existing one's ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn upsert_province(
        &self,
        name_english: &str,
        name_arabic: &str,
    ) -> Result<ProvinceId, RepositoryError> {
        let id = sqlx::query_scalar::<_, ProvinceId>(
            r"
            INSERT INTO iraqi_provinces (name_arabic, name_english)
            VALUES ($2, $1)
            ON CONFLICT (name_english) DO UPDATE SET name_english = EXCLUDED.name_english
            RETURNING id
            ",
        )
        .bind(name_english)
        .bind(name_arabic)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    // =========================================================================
    // Cities
    // =========================================================================

    /// Cities, optionally within one province.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cities(
        &self,
        province_id: Option<ProvinceId>,
        active_only: bool,
    ) -> Result<Vec<City>, RepositoryError> {
        let rows = sqlx::query_as::<_, City>(&format!(
            r"
            {CITY_SELECT}
            WHERE ($1::INTEGER IS NULL OR c.province_id = $1) AND (c.is_active OR NOT $2)
            ORDER BY c.name_english
            "
        ))
        .bind(province_id)
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Look a destination up by any of its names.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_city(&self, name: &str) -> Result<Option<City>, RepositoryError> {
        let row = sqlx::query_as::<_, City>(&format!(
            r"
            {CITY_SELECT}
            WHERE c.is_active
              AND (c.name_arabic = $1 OR LOWER(c.name_english) = LOWER($1) OR c.name_kurdish = $1)
            ORDER BY c.is_province_capital DESC
            LIMIT 1
            "
        ))
        .bind(name.trim())
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    async fn city_by_id(&self, id: CityId) -> Result<City, RepositoryError> {
        sqlx::query_as::<_, City>(&format!("{CITY_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Create a city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the province already has a city
    /// with that English name, or `NotFound` for an unknown province.
    pub async fn create_city(&self, input: &CityInput) -> Result<City, RepositoryError> {
        let id = sqlx::query_scalar::<_, CityId>(
            r"
            INSERT INTO iraqi_cities (
                province_id, name_arabic, name_english, name_kurdish,
                distance_from_erbil_km, is_province_capital, is_active
            )
            SELECT id, $2, $3, $4, $5, $6, $7 FROM iraqi_provinces WHERE id = $1
            RETURNING id
            ",
        )
        .bind(input.province_id)
        .bind(&input.name_arabic)
        .bind(&input.name_english)
        .bind(input.name_kurdish.as_deref())
        .bind(input.distance_from_erbil_km)
        .bind(input.is_province_capital)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "city already exists in this province"))?
        .ok_or(RepositoryError::NotFound)?;

        self.city_by_id(id).await
    }

    /// Replace a city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the city does not exist.
    pub async fn update_city(&self, id: CityId, input: &CityInput) -> Result<City, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE iraqi_cities SET
                province_id = $2, name_arabic = $3, name_english = $4, name_kurdish = $5,
                distance_from_erbil_km = $6, is_province_capital = $7, is_active = $8
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.province_id)
        .bind(&input.name_arabic)
        .bind(&input.name_english)
        .bind(input.name_kurdish.as_deref())
        .bind(input.distance_from_erbil_km)
        .bind(input.is_province_capital)
        .bind(input.is_active)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "city already exists in this province"))?;

        require_affected(result.rows_affected())?;
        self.city_by_id(id).await
    }

    /// Delete a city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the city does not exist.
    pub async fn delete_city(&self, id: CityId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM iraqi_cities WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }

    /// Insert or refresh a city by (province, English name).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn upsert_city(
        &self,
        province_id: ProvinceId,
        name_english: &str,
        name_arabic: &str,
        distance_from_erbil_km: i32,
    ) -> Result<CityId, RepositoryError> {
        let id = sqlx::query_scalar::<_, CityId>(
            r"
            INSERT INTO iraqi_cities (province_id, name_english, name_arabic, distance_from_erbil_km)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (province_id, name_english) DO UPDATE SET
                name_arabic = EXCLUDED.name_arabic,
                distance_from_erbil_km = EXCLUDED.distance_from_erbil_km
            RETURNING id
            ",
        )
        .bind(province_id)
        .bind(name_english)
        .bind(name_arabic)
        .bind(distance_from_erbil_km)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    // =========================================================================
    // International
    // =========================================================================

    /// All international countries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn countries(&self) -> Result<Vec<InternationalCountry>, RepositoryError> {
        let rows = sqlx::query_as::<_, InternationalCountry>(&format!(
            "SELECT {COUNTRY_COLUMNS} FROM international_countries ORDER BY name_english"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create a country.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the country code exists.
    pub async fn create_country(
        &self,
        input: &InternationalCountryInput,
    ) -> Result<InternationalCountry, RepositoryError> {
        let row = sqlx::query_as::<_, InternationalCountry>(&format!(
            r"
            INSERT INTO international_countries (
                name_english, name_local, country_code, currency, shipping_zone, customs_info, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COUNTRY_COLUMNS}
            "
        ))
        .bind(&input.name_english)
        .bind(input.name_local.as_deref())
        .bind(&input.country_code)
        .bind(input.currency.as_deref())
        .bind(input.shipping_zone.as_deref())
        .bind(input.customs_info.as_deref())
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "country code already exists"))?;

        Ok(row)
    }

    /// Replace a country.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the country does not exist.
    pub async fn update_country(
        &self,
        id: CountryId,
        input: &InternationalCountryInput,
    ) -> Result<InternationalCountry, RepositoryError> {
        sqlx::query_as::<_, InternationalCountry>(&format!(
            r"
            UPDATE international_countries SET
                name_english = $2, name_local = $3, country_code = $4, currency = $5,
                shipping_zone = $6, customs_info = $7, is_active = $8
            WHERE id = $1
            RETURNING {COUNTRY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.name_english)
        .bind(input.name_local.as_deref())
        .bind(&input.country_code)
        .bind(input.currency.as_deref())
        .bind(input.shipping_zone.as_deref())
        .bind(input.customs_info.as_deref())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "country code already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a country and its cities.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the country does not exist.
    pub async fn delete_country(&self, id: CountryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM international_countries WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }

    /// International cities, optionally within one country.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn international_cities(
        &self,
        country_id: Option<CountryId>,
    ) -> Result<Vec<InternationalCity>, RepositoryError> {
        let rows = sqlx::query_as::<_, InternationalCity>(&format!(
            r"
            SELECT {INTL_CITY_COLUMNS} FROM international_cities
            WHERE ($1::INTEGER IS NULL OR country_id = $1)
            ORDER BY name_english
            "
        ))
        .bind(country_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Create an international city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown country or
    /// `Conflict` for a duplicate name.
    pub async fn create_international_city(
        &self,
        input: &InternationalCityInput,
    ) -> Result<InternationalCity, RepositoryError> {
        sqlx::query_as::<_, InternationalCity>(&format!(
            r"
            INSERT INTO international_cities (
                country_id, name_english, name_local, distance_km, customs_info, is_active
            )
            SELECT id, $2, $3, $4, $5, $6 FROM international_countries WHERE id = $1
            RETURNING {INTL_CITY_COLUMNS}
            "
        ))
        .bind(input.country_id)
        .bind(&input.name_english)
        .bind(input.name_local.as_deref())
        .bind(input.distance_km)
        .bind(input.customs_info.as_deref())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "city already exists in this country"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Replace an international city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the city does not exist.
    pub async fn update_international_city(
        &self,
        id: InternationalCityId,
        input: &InternationalCityInput,
    ) -> Result<InternationalCity, RepositoryError> {
        sqlx::query_as::<_, InternationalCity>(&format!(
            r"
            UPDATE international_cities SET
                country_id = $2, name_english = $3, name_local = $4, distance_km = $5,
                customs_info = $6, is_active = $7
            WHERE id = $1
            RETURNING {INTL_CITY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.country_id)
        .bind(&input.name_english)
        .bind(input.name_local.as_deref())
        .bind(input.distance_km)
        .bind(input.customs_info.as_deref())
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "city already exists in this country"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete an international city.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the city does not exist.
    pub async fn delete_international_city(
        &self,
        id: InternationalCityId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM international_cities WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        require_affected(result.rows_affected())
    }
}
