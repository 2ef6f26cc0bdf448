use chrono::{Duration, NaiveDate};

use platter_core::api::InMemoryPlanApi;
use platter_core::models::{FoodSnapshot, FoodUnit, MealItem, MealPlanDay, NutrientTable};

fn food(id: i64, name: &str, nutrients: NutrientTable, units: &[(&str, f64)]) -> FoodSnapshot {
    FoodSnapshot {
        id,
        name: name.to_string(),
        ingredient_id: Some(id * 10),
        nutrients,
        units: units
            .iter()
            .map(|(name, amount)| FoodUnit {
                name: (*name).to_string(),
                amount: *amount,
            })
            .collect(),
    }
}

fn foods() -> Vec<FoodSnapshot> {
    vec![
        food(
            1,
            "Rolled oats",
            NutrientTable {
                calories: 389.0,
                protein: 16.9,
                carbs: 66.3,
                fat: 6.9,
                fiber: 10.6,
                sugar: 0.0,
                sodium: 2.0,
            },
            &[("g", 100.0), ("cup", 1.0)],
        ),
        food(
            2,
            "Chicken breast",
            NutrientTable {
                calories: 165.0,
                protein: 31.0,
                fat: 3.6,
                sodium: 74.0,
                ..NutrientTable::default()
            },
            &[("g", 100.0)],
        ),
        food(
            3,
            "Brown rice, cooked",
            NutrientTable {
                calories: 123.0,
                protein: 2.7,
                carbs: 25.6,
                fat: 1.0,
                fiber: 1.6,
                sugar: 0.2,
                sodium: 4.0,
            },
            &[("g", 100.0), ("cup", 0.51)],
        ),
        food(
            4,
            "Greek yogurt",
            NutrientTable {
                calories: 97.0,
                protein: 9.0,
                carbs: 3.6,
                fat: 5.0,
                sugar: 3.6,
                sodium: 35.0,
                ..NutrientTable::default()
            },
            &[("g", 100.0), ("pot", 1.7)],
        ),
        food(
            5,
            "Banana",
            NutrientTable {
                calories: 89.0,
                protein: 1.1,
                carbs: 22.8,
                fat: 0.3,
                fiber: 2.6,
                sugar: 12.2,
                sodium: 1.0,
            },
            &[("g", 100.0), ("medium", 1.18)],
        ),
    ]
}

/// In-memory backend seeded with three planned days around `today`, for
/// trying the CLI without a server. Nothing survives the process.
pub fn demo_api(today: NaiveDate) -> InMemoryPlanApi {
    let foods = foods();
    let pick = |id: i64| foods.iter().find(|f| f.id == id).cloned();
    let api = InMemoryPlanApi::new(foods.clone());

    let plans: [(i64, &[(i64, f64, usize)], &[(i64, f64, usize)], &[(i64, f64, usize)]); 3] = [
        (-1, &[(1, 60.0, 0), (5, 1.0, 1)], &[(2, 150.0, 0), (3, 1.0, 1)], &[]),
        (
            0,
            &[(1, 50.0, 0), (4, 1.0, 1)],
            &[(2, 200.0, 0), (3, 180.0, 0)],
            &[(2, 150.0, 0), (3, 1.5, 1), (5, 1.0, 1)],
        ),
        (1, &[(4, 2.0, 1)], &[], &[(2, 180.0, 0), (3, 150.0, 0)]),
    ];

    for (offset, breakfast, lunch, dinner) in plans {
        let mut day = MealPlanDay::virtual_empty(today + Duration::days(offset));
        day.id = Some(format!("demo-{}", offset + 2));
        for (items, target) in [
            (breakfast, &mut day.slots.breakfast),
            (lunch, &mut day.slots.lunch),
            (dinner, &mut day.slots.dinner),
        ] {
            target.extend(items.iter().filter_map(|(id, amount, unit)| {
                pick(*id).map(|f| MealItem::new(f, *amount, *unit))
            }));
        }
        api.insert_day(day);
    }
    api
}

#[cfg(test)]
mod tests {
    use super::*;
    use platter_core::api::MealPlanApi;

    #[tokio::test]
    async fn test_demo_days_around_today() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let api = demo_api(today);
        let days = api
            .fetch_day_range(today - Duration::days(3), today + Duration::days(3), "me")
            .await
            .unwrap();
        assert_eq!(days.len(), 3);
        let center = api.day(today).unwrap();
        assert_eq!(center.slots.dinner.len(), 3);
        assert_eq!(center.id.as_deref(), Some("demo-2"));
        assert!(center.slots.items().all(|i| i.food.unit(i.unit_index).is_some()));
    }
}
