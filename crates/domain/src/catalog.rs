//! Wines and regions.

use common::{Money, Page, PageRequest, RegionId, WineId};
use store::{
    NewRegion, NewWine, Region, RegionRepository, Store, StoreTransaction, Wine, WineRepository,
    WineSearchParameters, WineSpecificationBuilder,
};

use crate::error::DomainError;

/// Catalog reads, search and admin writes.
pub struct CatalogService<S: Store> {
    store: S,
    specifications: WineSpecificationBuilder,
}

impl<S: Store> CatalogService<S> {
    /// Creates a catalog service searching with the default providers.
    pub fn new(store: S) -> Self {
        Self::with_specifications(store, WineSpecificationBuilder::default())
    }

    pub fn with_specifications(store: S, specifications: WineSpecificationBuilder) -> Self {
        Self {
            store,
            specifications,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_wine(&self, id: WineId) -> Result<Wine, DomainError> {
        let mut tx = self.store.begin().await?;
        tx.find_wine(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Wine", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_wines(&self, page: &PageRequest) -> Result<Page<Wine>, DomainError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_wines(page).await?)
    }

    /// Lists the wines of a region. The region itself must be visible.
    #[tracing::instrument(skip(self))]
    pub async fn list_wines_by_region(
        &self,
        region_id: RegionId,
        page: &PageRequest,
    ) -> Result<Page<Wine>, DomainError> {
        let mut tx = self.store.begin().await?;
        if tx.find_region(region_id).await?.is_none() {
            return Err(DomainError::not_found("Region", region_id));
        }
        Ok(tx.list_wines_by_region(region_id, page).await?)
    }

    /// Finds the wines matching every non-empty group of `params`.
    #[tracing::instrument(skip(self))]
    pub async fn search(
        &self,
        params: &WineSearchParameters,
        page: &PageRequest,
    ) -> Result<Page<Wine>, DomainError> {
        let spec = self.specifications.build(params)?;
        let mut tx = self.store.begin().await?;
        Ok(tx.search_wines(&spec, page).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_wine(&self, mut wine: NewWine) -> Result<Wine, DomainError> {
        wine.price = cent_price(wine.price)?;
        let mut tx = self.store.begin().await?;
        if tx.find_region(wine.region_id).await?.is_none() {
            return Err(DomainError::not_found("Region", wine.region_id));
        }
        let wine = tx.insert_wine(wine).await?;
        tx.commit().await?;

        tracing::info!(wine_id = %wine.id, "Wine created");
        Ok(wine)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_wine(&self, id: WineId, update: NewWine) -> Result<Wine, DomainError> {
        let price = cent_price(update.price)?;
        let mut tx = self.store.begin().await?;
        if tx.find_wine(id).await?.is_none() {
            return Err(DomainError::not_found("Wine", id));
        }
        if tx.find_region(update.region_id).await?.is_none() {
            return Err(DomainError::not_found("Region", update.region_id));
        }
        let wine = Wine {
            id,
            name: update.name,
            price,
            grape_variety: update.grape_variety,
            region_id: update.region_id,
        };
        let wine = tx.update_wine(&wine).await?;
        tx.commit().await?;
        Ok(wine)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_wine(&self, id: WineId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        if !tx.soft_delete_wine(id).await? {
            return Err(DomainError::not_found("Wine", id));
        }
        tx.commit().await?;

        tracing::info!(wine_id = %id, "Wine deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_region(&self, id: RegionId) -> Result<Region, DomainError> {
        let mut tx = self.store.begin().await?;
        tx.find_region(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Region", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_regions(&self, page: &PageRequest) -> Result<Page<Region>, DomainError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_regions(page).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_region(&self, region: NewRegion) -> Result<Region, DomainError> {
        let mut tx = self.store.begin().await?;
        let region = tx.insert_region(region).await?;
        tx.commit().await?;
        Ok(region)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_region(
        &self,
        id: RegionId,
        update: NewRegion,
    ) -> Result<Region, DomainError> {
        let region = Region {
            id,
            name: update.name,
            country: update.country,
        };
        let mut tx = self.store.begin().await?;
        tx.update_region(&region).await?;
        tx.commit().await?;
        Ok(region)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_region(&self, id: RegionId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;
        if !tx.soft_delete_region(id).await? {
            return Err(DomainError::not_found("Region", id));
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Prices are kept to the cent. Finer amounts are refused rather than
/// rounded so the stored price is always the one the caller sent.
fn cent_price(price: Money) -> Result<Money, DomainError> {
    if price.is_negative() {
        return Err(DomainError::Processing(
            "Price must not be negative".to_string(),
        ));
    }
    if !price.is_whole_cents() {
        return Err(DomainError::Processing(format!(
            "Price {price} has more than two decimal places"
        )));
    }
    Ok(price.to_cents_scale())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use store::{InMemoryStore, SpecificationError, SpecificationProviderRegistry};

    async fn seeded() -> (CatalogService<InMemoryStore>, Region) {
        let service = CatalogService::new(InMemoryStore::new());
        let region = service
            .create_region(NewRegion {
                name: "Rioja".to_string(),
                country: "Spain".to_string(),
            })
            .await
            .unwrap();
        (service, region)
    }

    fn new_wine(name: &str, grape: &str, region_id: RegionId) -> NewWine {
        NewWine {
            name: name.to_string(),
            price: Money::new(dec!(18.90)),
            grape_variety: grape.to_string(),
            region_id,
        }
    }

    #[tokio::test]
    async fn create_wine_requires_visible_region() {
        let (service, region) = seeded().await;
        service.delete_region(region.id).await.unwrap();

        let err = service
            .create_wine(new_wine("X", "Merlot", region.id))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleted_wine_is_not_found() {
        let (service, region) = seeded().await;
        let wine = service
            .create_wine(new_wine("X", "Merlot", region.id))
            .await
            .unwrap();

        service.delete_wine(wine.id).await.unwrap();
        assert!(matches!(
            service.find_wine(wine.id).await.unwrap_err(),
            DomainError::NotFound(_)
        ));
        assert!(matches!(
            service.delete_wine(wine.id).await.unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn update_wine_overwrites_fields() {
        let (service, region) = seeded().await;
        let wine = service
            .create_wine(new_wine("X", "Merlot", region.id))
            .await
            .unwrap();

        let mut update = new_wine("Y", "Syrah", region.id);
        update.price = Money::new(dec!(5.00));
        service.update_wine(wine.id, update).await.unwrap();

        let loaded = service.find_wine(wine.id).await.unwrap();
        assert_eq!(loaded.name, "Y");
        assert_eq!(loaded.price, Money::new(dec!(5.00)));
    }

    #[tokio::test]
    async fn sub_cent_prices_are_rejected() {
        let (service, region) = seeded().await;
        let mut wine = new_wine("X", "Merlot", region.id);
        wine.price = Money::new(dec!(0.005));
        assert!(matches!(
            service.create_wine(wine).await.unwrap_err(),
            DomainError::Processing(_)
        ));

        let created = service
            .create_wine(new_wine("X", "Merlot", region.id))
            .await
            .unwrap();
        let mut update = new_wine("X", "Merlot", region.id);
        update.price = Money::new(dec!(9.999));
        assert!(matches!(
            service.update_wine(created.id, update).await.unwrap_err(),
            DomainError::Processing(_)
        ));
        assert_eq!(
            service.find_wine(created.id).await.unwrap().price,
            Money::new(dec!(18.90))
        );
    }

    #[tokio::test]
    async fn prices_are_returned_with_two_decimal_places() {
        let (service, region) = seeded().await;
        let mut wine = new_wine("X", "Merlot", region.id);
        wine.price = Money::new(dec!(12.5));
        let created = service.create_wine(wine).await.unwrap();
        assert_eq!(created.price.to_string(), "12.50");

        let mut update = new_wine("X", "Merlot", region.id);
        update.price = Money::new(dec!(7.000));
        let updated = service.update_wine(created.id, update).await.unwrap();
        assert_eq!(updated.price.to_string(), "7.00");
        assert_eq!(service.find_wine(created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn search_with_empty_groups_matches_by_name_only() {
        let (service, region) = seeded().await;
        service
            .create_wine(new_wine("X", "Merlot", region.id))
            .await
            .unwrap();
        service
            .create_wine(new_wine("Y", "Merlot", region.id))
            .await
            .unwrap();

        let params = WineSearchParameters::new()
            .names(["X"])
            .grape_varieties(Vec::<String>::new());
        let page = service.search(&params, &PageRequest::first()).await.unwrap();
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].name, "X");

        let all = service
            .search(&WineSearchParameters::new(), &PageRequest::first())
            .await
            .unwrap();
        assert_eq!(all.total_elements, 2);
    }

    #[tokio::test]
    async fn search_with_missing_provider_is_a_configuration_error() {
        let service = CatalogService::with_specifications(
            InMemoryStore::new(),
            WineSpecificationBuilder::new(SpecificationProviderRegistry::empty()),
        );
        let err = service
            .search(
                &WineSearchParameters::new().names(["X"]),
                &PageRequest::first(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Configuration(SpecificationError::MissingProvider(_))
        ));
    }

    #[tokio::test]
    async fn wines_by_region() {
        let (service, region) = seeded().await;
        let other = service
            .create_region(NewRegion {
                name: "Mosel".to_string(),
                country: "Germany".to_string(),
            })
            .await
            .unwrap();
        service
            .create_wine(new_wine("X", "Tempranillo", region.id))
            .await
            .unwrap();
        service
            .create_wine(new_wine("Y", "Riesling", other.id))
            .await
            .unwrap();

        let page = service
            .list_wines_by_region(other.id, &PageRequest::first())
            .await
            .unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].name, "Y");

        assert!(matches!(
            service
                .list_wines_by_region(RegionId::new(99), &PageRequest::first())
                .await
                .unwrap_err(),
            DomainError::NotFound(_)
        ));
    }
}
