use common::{Money, UserId, WineId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CartService, CatalogService, OrderService, Registration, UserService};
use rust_decimal_macros::dec;
use store::{InMemoryStore, NewRegion, NewWine};

fn seed(rt: &tokio::runtime::Runtime, store: &InMemoryStore, wines: usize) -> (UserId, Vec<WineId>) {
    rt.block_on(async {
        let user = UserService::new(store.clone())
            .register(Registration {
                username: "bench".to_string(),
                password_hash: "hash".to_string(),
                email: "bench@example.com".to_string(),
                first_name: "Bench".to_string(),
                last_name: "User".to_string(),
            })
            .await
            .unwrap();

        let catalog = CatalogService::new(store.clone());
        let region = catalog
            .create_region(NewRegion {
                name: "Bordeaux".to_string(),
                country: "France".to_string(),
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for i in 0..wines {
            let wine = catalog
                .create_wine(NewWine {
                    name: format!("Wine {i}"),
                    price: Money::new(dec!(12.99)),
                    grape_variety: "Merlot".to_string(),
                    region_id: region.id,
                })
                .await
                .unwrap();
            ids.push(wine.id);
        }
        (user.id, ids)
    })
}

fn bench_add_wine(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let (user, wines) = seed(&rt, &store, 1);
    let cart = CartService::new(store);

    c.bench_function("domain/add_wine_merge", |b| {
        b.iter(|| {
            rt.block_on(async {
                cart.add_wine(user, wines[0], 3).await.unwrap();
            });
        });
    });
}

fn bench_checkout_10_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let (user, wines) = seed(&rt, &store, 10);
    let cart = CartService::new(store.clone());
    let orders = OrderService::new(store);

    c.bench_function("domain/checkout_10_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                for wine in &wines {
                    cart.add_wine(user, *wine, 2).await.unwrap();
                }
                orders
                    .create_order(user, "1 Bench Street".to_string())
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_add_wine, bench_checkout_10_lines);
criterion_main!(benches);
