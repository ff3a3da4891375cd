//! 舵机模型集成测试

use dynamixel_driver::{BusBuilder, CancellationToken, Servo};
use dynamixel_protocol::{Instruction, S_MODEL};
use dynamixel_serial::mock::SimulatedBus;
use std::time::Duration;

fn setup(id: u8) -> (Servo, SimulatedBus) {
    let sim = SimulatedBus::with_servos(&[id]);
    let bus = BusBuilder::new()
        .read_timeout(Duration::from_millis(50))
        .build_with_transport(sim.clone());
    (Servo::new(bus, id).unwrap(), sim)
}

#[test]
fn test_integer_angles_round_trip() {
    let (servo, _sim) = setup(1);
    let token = CancellationToken::new();
    for degrees in 0..360u32 {
        servo.move_to(f64::from(degrees), &token).unwrap();
        let read = servo.angle(&token).unwrap();
        assert_eq!(read.round() as u32, degrees, "read back {read}");
    }
}

#[test]
fn test_move_writes_goal_position_register() {
    let (servo, sim) = setup(3);
    servo.move_to(90.0, &CancellationToken::new()).unwrap();

    let writes = sim.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].instruction, Instruction::Write);
    assert_eq!(writes[0].params, vec![S_MODEL.goal_position.address, 0x00, 0x04]);
    assert_eq!(sim.register(3, &S_MODEL.goal_position), Some(1024));
}

#[test]
fn test_goal_angle_follows_move() {
    let (servo, _sim) = setup(1);
    let token = CancellationToken::new();
    servo.move_to(45.0, &token).unwrap();
    assert_eq!(servo.goal_angle(&token).unwrap(), 45.0);
}

#[test]
fn test_torque_and_moving_flags() {
    let (servo, sim) = setup(1);
    let token = CancellationToken::new();

    assert!(!servo.torque_enabled(&token).unwrap());
    servo.set_torque_enable(true, &token).unwrap();
    assert!(servo.torque_enabled(&token).unwrap());
    assert_eq!(sim.register(1, &S_MODEL.torque_enable), Some(1));

    assert!(!servo.moving(&token).unwrap());
    // 任意非零值都视为运动中
    sim.set_register(1, &S_MODEL.moving, 7);
    assert!(servo.moving(&token).unwrap());
}

#[test]
fn test_led_and_speed_registers() {
    let (servo, sim) = setup(1);
    let token = CancellationToken::new();
    servo.set_led(true, &token).unwrap();
    servo.set_moving_speed(300, &token).unwrap();
    assert_eq!(sim.register(1, &S_MODEL.led), Some(1));
    assert_eq!(sim.register(1, &S_MODEL.moving_speed), Some(300));
    assert_eq!(servo.read_register(&S_MODEL.moving_speed, &token).unwrap(), 300);

    servo
        .write_register(&S_MODEL.torque_limit, 512, &token)
        .unwrap();
    assert_eq!(sim.register(1, &S_MODEL.torque_limit), Some(512));
}

#[test]
fn test_servos_share_one_bus() {
    let sim = SimulatedBus::with_servos(&[1, 2]);
    let bus = BusBuilder::new().build_with_transport(sim.clone());
    let token = CancellationToken::new();
    let a = Servo::new(bus.clone(), 1).unwrap();
    let b = Servo::new(bus.clone(), 2).unwrap();

    a.move_to(10.0, &token).unwrap();
    b.move_to(20.0, &token).unwrap();
    assert_eq!(a.angle(&token).unwrap().round(), 10.0);
    assert_eq!(b.angle(&token).unwrap().round(), 20.0);
    assert_eq!(bus.metrics().snapshot().transactions, 4);
}
