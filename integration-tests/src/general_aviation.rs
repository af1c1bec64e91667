//! A deliberately small sizing loop for a single piston-engine airplane.
//!
//! The correlations are crude but keep the coupling structure of a real
//! sizing process: maximum take-off weight sets the wing, the wing sets the
//! drag, the drag sets the engine and the fuel, and both feed back into the
//! weight.
//!
//! ```text
//! atmosphere -> [ geometry -> aerodynamics -> propulsion -> performance -> weight ] -> handling
//!                   ^                                                          |
//!                   +----------------------------------------------------------+
//! ```

use mda_core::{
    DisciplineError, FnDiscipline, GraphBuilder, Value, Values, Variable, discipline::scalar,
};
use mda_engine::DesignPoint;

pub mod names {
    pub const ALTITUDE: &str = "data:mission:sizing:cruise:altitude";
    pub const CRUISE_SPEED: &str = "data:mission:sizing:cruise:speed";
    pub const RANGE: &str = "data:mission:sizing:range";
    pub const PAYLOAD: &str = "data:weight:payload:mass";

    pub const DENSITY: &str = "data:environment:cruise:density";

    pub const WING_LOADING: &str = "data:geometry:wing:loading";
    pub const ASPECT_RATIO: &str = "data:geometry:wing:aspect_ratio";
    pub const WING_AREA: &str = "data:geometry:wing:area";
    pub const WING_SPAN: &str = "data:geometry:wing:span";
    pub const WING_CHORDS: &str = "data:geometry:wing:chords";

    pub const CD0: &str = "data:aerodynamics:aircraft:cruise:CD0";
    pub const OSWALD: &str = "data:aerodynamics:wing:oswald";
    pub const DRAG: &str = "data:aerodynamics:aircraft:cruise:drag";
    pub const LIFT_TO_DRAG: &str = "data:aerodynamics:aircraft:cruise:L_D";

    pub const PROPELLER_EFFICIENCY: &str = "data:propulsion:propeller:efficiency";
    pub const SFC: &str = "data:propulsion:engine:sfc";
    pub const POWER_TO_MASS: &str = "data:propulsion:engine:power_to_mass";
    pub const SHAFT_POWER: &str = "data:propulsion:engine:cruise:power";
    pub const ENGINE_MASS: &str = "data:weight:propulsion:engine:mass";
    pub const FUEL_FLOW: &str = "data:propulsion:engine:cruise:fuel_flow";

    pub const FUEL_RESERVE: &str = "data:mission:sizing:fuel:reserve_ratio";
    pub const MISSION_FUEL: &str = "data:mission:sizing:fuel";

    pub const STRUCTURE_MASS: &str = "data:weight:airframe:mass";
    pub const MTOW: &str = "data:weight:aircraft:MTOW";

    pub const CL_MAX: &str = "data:aerodynamics:aircraft:landing:CL_max";
    pub const STALL_SPEED: &str = "data:handling:stall_speed";
}

use names::*;

const GRAVITY: f64 = 9.81;

fn outputs<const N: usize>(entries: [(&str, Value); N]) -> Values {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// ISA density at the cruise altitude (troposphere only).
pub fn atmosphere() -> FnDiscipline {
    FnDiscipline::builder("environment:atmosphere")
        .input(Variable::scalar(ALTITUDE, "m"))
        .output(Variable::scalar(DENSITY, "kg/m**3"))
        .build(|inputs| {
            let altitude = scalar(inputs, ALTITUDE)?;
            if !(0.0..=11_000.0).contains(&altitude) {
                return Err(DisciplineError::message(format!(
                    "altitude {altitude} m is outside the troposphere"
                )));
            }
            let density = 1.225 * (1.0 - 2.2558e-5 * altitude).powf(4.256);
            Ok(outputs([(DENSITY, density.into())]))
        })
}

/// Wing area from wing loading, span from aspect ratio, and a linear chord law.
pub fn geometry() -> FnDiscipline {
    FnDiscipline::builder("geometry:wing")
        .input(Variable::scalar(MTOW, "kg"))
        .input(Variable::scalar(WING_LOADING, "kg/m**2").with_default(110.0))
        .input(Variable::scalar(ASPECT_RATIO, "").with_default(8.0))
        .output(Variable::scalar(WING_AREA, "m**2"))
        .output(Variable::scalar(WING_SPAN, "m"))
        .output(
            Variable::array(WING_CHORDS, "m", 3)
                .with_description("root, mid-span and tip chords"),
        )
        .build(|inputs| {
            let area = scalar(inputs, MTOW)? / scalar(inputs, WING_LOADING)?;
            let span = (scalar(inputs, ASPECT_RATIO)? * area).sqrt();
            let mean_chord = area / span;
            let chords = [1.25, 1.0, 0.75].map(|ratio| ratio * mean_chord);
            Ok(outputs([
                (WING_AREA, area.into()),
                (WING_SPAN, span.into()),
                (WING_CHORDS, chords.into()),
            ]))
        })
}

/// Parabolic drag polar at cruise.
pub fn aerodynamics() -> FnDiscipline {
    FnDiscipline::builder("aerodynamics:cruise")
        .input(Variable::scalar(MTOW, "kg"))
        .input(Variable::scalar(WING_AREA, "m**2"))
        .input(Variable::scalar(ASPECT_RATIO, "").with_default(8.0))
        .input(Variable::scalar(DENSITY, "kg/m**3"))
        .input(Variable::scalar(CRUISE_SPEED, "m/s"))
        .input(Variable::scalar(CD0, "").with_default(0.027))
        .input(Variable::scalar(OSWALD, "").with_default(0.78))
        .output(Variable::scalar(DRAG, "N"))
        .output(Variable::scalar(LIFT_TO_DRAG, ""))
        .build(|inputs| {
            let speed = scalar(inputs, CRUISE_SPEED)?;
            let area = scalar(inputs, WING_AREA)?;
            let dynamic_pressure = 0.5 * scalar(inputs, DENSITY)? * speed * speed;
            let cl = scalar(inputs, MTOW)? * GRAVITY / (dynamic_pressure * area);
            let induced = cl * cl
                / (std::f64::consts::PI * scalar(inputs, OSWALD)? * scalar(inputs, ASPECT_RATIO)?);
            let cd = scalar(inputs, CD0)? + induced;
            Ok(outputs([
                (DRAG, (dynamic_pressure * area * cd).into()),
                (LIFT_TO_DRAG, (cl / cd).into()),
            ]))
        })
}

/// Shaft power, engine mass and fuel flow needed to overcome cruise drag.
pub fn propulsion() -> FnDiscipline {
    FnDiscipline::builder("propulsion:engine")
        .input(Variable::scalar(DRAG, "N"))
        .input(Variable::scalar(CRUISE_SPEED, "m/s"))
        .input(Variable::scalar(PROPELLER_EFFICIENCY, "").with_default(0.82))
        .input(Variable::scalar(SFC, "kg/W/h").with_default(2.5e-4))
        .input(Variable::scalar(POWER_TO_MASS, "W/kg").with_default(1200.0))
        .output(Variable::scalar(SHAFT_POWER, "W"))
        .output(Variable::scalar(ENGINE_MASS, "kg"))
        .output(Variable::scalar(FUEL_FLOW, "kg/h"))
        .build(|inputs| {
            let power = scalar(inputs, DRAG)? * scalar(inputs, CRUISE_SPEED)?
                / scalar(inputs, PROPELLER_EFFICIENCY)?;
            Ok(outputs([
                (SHAFT_POWER, power.into()),
                (ENGINE_MASS, (power / scalar(inputs, POWER_TO_MASS)?).into()),
                (FUEL_FLOW, (scalar(inputs, SFC)? * power).into()),
            ]))
        })
}

/// Mission fuel for the sizing range, with a reserve.
pub fn performance() -> FnDiscipline {
    FnDiscipline::builder("performance:mission")
        .input(Variable::scalar(FUEL_FLOW, "kg/h"))
        .input(Variable::scalar(RANGE, "m"))
        .input(Variable::scalar(CRUISE_SPEED, "m/s"))
        .input(Variable::scalar(FUEL_RESERVE, "").with_default(0.1))
        .output(Variable::scalar(MISSION_FUEL, "kg"))
        .build(|inputs| {
            let hours = scalar(inputs, RANGE)? / scalar(inputs, CRUISE_SPEED)? / 3600.0;
            let fuel = (1.0 + scalar(inputs, FUEL_RESERVE)?) * scalar(inputs, FUEL_FLOW)? * hours;
            Ok(outputs([(MISSION_FUEL, fuel.into())]))
        })
}

/// Mass breakdown closing the loop on MTOW.
pub fn weight() -> FnDiscipline {
    FnDiscipline::builder("weight:aircraft")
        .input(Variable::scalar(WING_AREA, "m**2"))
        .input(Variable::scalar(ENGINE_MASS, "kg"))
        .input(Variable::scalar(MISSION_FUEL, "kg"))
        .input(Variable::scalar(PAYLOAD, "kg"))
        .output(Variable::scalar(STRUCTURE_MASS, "kg"))
        .output(Variable::scalar(MTOW, "kg"))
        .build(|inputs| {
            let structure = 10.0 * scalar(inputs, WING_AREA)? + 250.0;
            let empty = structure + scalar(inputs, ENGINE_MASS)? + 80.0;
            let mtow = empty + scalar(inputs, PAYLOAD)? + scalar(inputs, MISSION_FUEL)?;
            Ok(outputs([(STRUCTURE_MASS, structure.into()), (MTOW, mtow.into())]))
        })
}

/// Sea-level stall speed of the sized airplane.
pub fn handling() -> FnDiscipline {
    FnDiscipline::builder("handling:stall")
        .input(Variable::scalar(MTOW, "kg"))
        .input(Variable::scalar(WING_AREA, "m**2"))
        .input(Variable::scalar(CL_MAX, "").with_default(1.6))
        .output(Variable::scalar(STALL_SPEED, "m/s"))
        .build(|inputs| {
            let lift_per_speed = 0.5 * 1.225 * scalar(inputs, WING_AREA)? * scalar(inputs, CL_MAX)?;
            let speed = (scalar(inputs, MTOW)? * GRAVITY / lift_per_speed).sqrt();
            Ok(outputs([(STALL_SPEED, speed.into())]))
        })
}

/// All disciplines and the mission design variables, ready to build.
pub fn sizing_builder() -> GraphBuilder {
    GraphBuilder::new()
        .design_variable(Variable::scalar(ALTITUDE, "m"))
        .design_variable(Variable::scalar(CRUISE_SPEED, "m/s"))
        .design_variable(Variable::scalar(RANGE, "m"))
        .design_variable(Variable::scalar(PAYLOAD, "kg"))
        .discipline(atmosphere())
        .discipline(geometry())
        .discipline(aerodynamics())
        .discipline(propulsion())
        .discipline(performance())
        .discipline(weight())
        .discipline(handling())
}

/// A four-seat touring mission.
pub fn touring_mission() -> DesignPoint {
    DesignPoint::new()
        .with_unit(ALTITUDE, 2400.0, "m")
        .with_unit(CRUISE_SPEED, 70.0, "m/s")
        .with_unit(RANGE, 1.2e6, "m")
        .with_unit(PAYLOAD, 360.0, "kg")
}
