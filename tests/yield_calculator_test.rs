// ==========================================
// 产出测算集成测试（真实 SQLite 系数来源）
// ==========================================
// 测试范围:
// 1. 单次测算: 基准用例、零原料、零参数、未知类型、损耗 > 100
// 2. 按物料逐产品测算: 各产品使用自己的类型系数
// 3. 参数默认值来自配置
// ==========================================


use obraz_plus::config::config_keys;
use obraz_plus::domain::{MaterialFields, NewMaterialType, NewProductType};
use obraz_plus::engine::{YieldError, YieldRequest, NOT_COMPUTABLE};
use obraz_plus::repository::{MaterialTypeRepository, ProductTypeRepository};
use obraz_plus::AppState;
use tempfile::NamedTempFile;
use test_helpers::{create_test_state, load_reference_data};

struct Factors {
    product_type_id: i64,
    material_type_id: i64,
}

/// 系数 5 的产品类型 + 损耗率为 loss 的物料类型
fn setup_factors(loss_percentage: f64) -> (NamedTempFile, AppState, Factors) {
    let (db, state) = create_test_state();
    let db_path = db.path().to_str().unwrap();

    let product_type_id = ProductTypeRepository::new(db_path)
        .unwrap()
        .insert(&NewProductType {
            name: "Плитка".to_string(),
            coefficient: 5.0,
        })
        .unwrap();
    let material_type_id = MaterialTypeRepository::new(db_path)
        .unwrap()
        .insert(&NewMaterialType {
            name: "Глина".to_string(),
            loss_percentage,
        })
        .unwrap();

    (
        db,
        state,
        Factors {
            product_type_id,
            material_type_id,
        },
    )
}

fn request(f: &Factors, raw_quantity: f64, param1: f64, param2: f64) -> YieldRequest {
    YieldRequest {
        product_type_id: Some(f.product_type_id),
        material_type_id: Some(f.material_type_id),
        raw_quantity,
        param1,
        param2,
    }
}

// ==========================================
// 单次测算
// ==========================================

#[test]
fn test_compute_基准用例() {
    let (_db, state, f) = setup_factors(20.0);
    let req = request(&f, 100.0, 2.0, 1.0);

    assert_eq!(state.yield_api.compute(&req), Ok(8));
    assert_eq!(state.yield_api.compute_sentinel(&req), 8);
}

#[test]
fn test_compute_零原料结果为0而非哨兵() {
    let (_db, state, f) = setup_factors(0.0);
    let req = request(&f, 0.0, 2.0, 1.0);

    assert_eq!(state.yield_api.compute(&req), Ok(0));
    assert_eq!(state.yield_api.compute_sentinel(&req), 0);
}

#[test]
fn test_compute_零参数返回哨兵() {
    let (_db, state, f) = setup_factors(20.0);

    for raw in [0.0, 1.0, 100.0, 1e9] {
        let req = request(&f, raw, 0.0, 1.0);
        assert_eq!(state.yield_api.compute_sentinel(&req), NOT_COMPUTABLE);
        assert_eq!(state.yield_api.compute(&req), Err(YieldError::DivisionByZero));
    }
}

#[test]
fn test_compute_未知类型返回哨兵() {
    let (_db, state, f) = setup_factors(20.0);

    let mut unknown_product = request(&f, 100.0, 2.0, 1.0);
    unknown_product.product_type_id = Some(f.product_type_id + 100);
    assert_eq!(state.yield_api.compute_sentinel(&unknown_product), NOT_COMPUTABLE);
    assert!(matches!(
        state.yield_api.compute(&unknown_product),
        Err(YieldError::ProductTypeNotFound { .. })
    ));

    let mut unknown_material = request(&f, 100.0, 2.0, 1.0);
    unknown_material.material_type_id = Some(f.material_type_id + 100);
    assert_eq!(state.yield_api.compute_sentinel(&unknown_material), NOT_COMPUTABLE);
    assert!(matches!(
        state.yield_api.compute(&unknown_material),
        Err(YieldError::MaterialTypeNotFound { .. })
    ));
}

#[test]
fn test_compute_损耗超过100返回哨兵() {
    let (_db, state, f) = setup_factors(120.0);
    let req = request(&f, 100.0, 2.0, 1.0);

    assert_eq!(state.yield_api.compute_sentinel(&req), NOT_COMPUTABLE);
    assert!(matches!(
        state.yield_api.compute(&req),
        Err(YieldError::NegativeResult { .. })
    ));
}

#[test]
fn test_compute_不足一件向下取整() {
    let (_db, state, f) = setup_factors(20.0);
    // 80 * 0.8 = 64; 64 / 10 = 6.4
    assert_eq!(state.yield_api.compute(&request(&f, 80.0, 2.0, 1.0)), Ok(6));
    // 10 * 0.8 = 8; 8 / 10 = 0.8
    assert_eq!(state.yield_api.compute(&request(&f, 10.0, 2.0, 1.0)), Ok(0));
}

// ==========================================
// 按物料逐产品测算
// ==========================================

#[test]
fn test_estimate_for_material_各产品使用自己的类型() {
    let (_db, state) = create_test_state();
    let (_dir, _report) = load_reference_data(&state);

    let clay_id = state
        .material_api
        .find_material_id_by_name("Глина красная")
        .unwrap()
        .unwrap();
    let estimate = state
        .yield_api
        .estimate_for_material(clay_id, Some(2.0), Some(1.0))
        .unwrap();

    assert_eq!(estimate.raw_quantity, 100.0);
    assert_eq!(estimate.products.len(), 2);

    // Плитка: 2*1*5 = 10; 100*0.8 = 80 -> 8
    let tile = &estimate.products[0];
    assert_eq!(tile.product_name, "Плитка 30x30");
    assert_eq!(tile.quantity, Some(8));
    assert!(tile.error.is_none());

    // Кирпич: 2*1*2 = 4; 80 / 4 = 20
    let brick = &estimate.products[1];
    assert_eq!(brick.product_name, "Кирпич М100");
    assert_eq!(brick.quantity, Some(20));
}

#[test]
fn test_estimate_for_material_参数默认取配置() {
    let (_db, state) = create_test_state();
    let (_dir, _report) = load_reference_data(&state);
    state
        .config_manager
        .set_value(config_keys::CALC_DEFAULT_PARAM1, "4")
        .unwrap();

    let clay_id = state
        .material_api
        .find_material_id_by_name("Глина красная")
        .unwrap()
        .unwrap();
    let estimate = state
        .yield_api
        .estimate_for_material(clay_id, None, None)
        .unwrap();

    assert_eq!(estimate.param1, 4.0);
    assert_eq!(estimate.param2, 1.0);
    // Плитка: 4*1*5 = 20; 80 / 20 = 4
    assert_eq!(estimate.products[0].quantity, Some(4));
}

#[test]
fn test_estimate_for_material_配置值格式错误() {
    let (_db, state) = create_test_state();
    let (_dir, _report) = load_reference_data(&state);
    state
        .config_manager
        .set_value(config_keys::CALC_DEFAULT_PARAM2, "два")
        .unwrap();

    let clay_id = state.material_api.list_materials().unwrap()[0].id;
    let err = state
        .yield_api
        .estimate_for_material(clay_id, Some(1.0), None)
        .unwrap_err();
    assert_eq!(err.code(), "CONFIG_ERROR");

    // 两个参数都显式给出时不读取配置
    assert!(state
        .yield_api
        .estimate_for_material(clay_id, Some(1.0), Some(1.0))
        .is_ok());
}

#[test]
fn test_estimate_for_material_无类型物料每行都不可计算() {
    let (_db, state) = create_test_state();
    let (_dir, _report) = load_reference_data(&state);

    let clay_id = state
        .material_api
        .find_material_id_by_name("Глина красная")
        .unwrap()
        .unwrap();
    let fields = MaterialFields {
        type_id: None,
        ..state.material_api.get_material(clay_id).unwrap().fields()
    };
    assert!(state.material_api.save_material(Some(clay_id), fields).success);

    let estimate = state
        .yield_api
        .estimate_for_material(clay_id, Some(2.0), Some(1.0))
        .unwrap();
    assert_eq!(estimate.products.len(), 2);
    for row in &estimate.products {
        assert_eq!(row.quantity, None);
        assert_eq!(
            row.error,
            Some(YieldError::MaterialTypeNotFound {
                material_type_id: None
            })
        );
    }
}

#[test]
fn test_estimate_for_material_物料不存在() {
    let (_db, state) = create_test_state();
    let err = state
        .yield_api
        .estimate_for_material(42, None, None)
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}
