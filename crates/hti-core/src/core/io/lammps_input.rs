use crate::core::io::format::sci;
use crate::core::io::traits::ScriptGenerator;
use crate::core::md::{Ensemble, MdSettings};
use crate::core::stage::{CoupledTerm, Coupling, SoftCoreParams, Stage};
use crate::core::thermo::Observable;
use std::fmt::Write;

pub const INPUT_FILE_NAME: &str = "in.lammps";
pub const DUMP_FILE_NAME: &str = "dump.equi";

const SOFT_STYLE: &str = "lj/cut/soft";
const MODEL_STYLE: &str = "deepmd";

/// Everything needed to render the input of one (stage, lambda) task.
#[derive(Debug, Clone)]
pub struct TaskScript<'a> {
    pub stage: Stage,
    pub lambda: f64,
    /// Paths as seen from the task directory.
    pub conf_file: &'a str,
    pub model_file: &'a str,
    pub masses: &'a [f64],
    pub copies: Option<[u32; 3]>,
    pub soft: &'a SoftCoreParams,
    pub md: &'a MdSettings,
    pub velocity_seed: u32,
}

/// LAMMPS input decks for the integration tasks and for equilibration runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LammpsInput;

impl ScriptGenerator for LammpsInput {
    fn file_name(&self) -> &str {
        INPUT_FILE_NAME
    }

    fn render(&self, task: &TaskScript<'_>) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = write_script(&mut out, task);
        out
    }
}

/// Inputs of a plain model-potential run that relaxes a configuration at the target
/// conditions and dumps its trajectory.
#[derive(Debug, Clone)]
pub struct EquilibrationScript<'a> {
    pub conf_file: &'a str,
    pub model_file: &'a str,
    pub masses: &'a [f64],
    pub md: &'a MdSettings,
    /// Trajectory output interval in steps.
    pub dump_freq: u64,
    pub velocity_seed: u32,
}

impl LammpsInput {
    pub fn render_equilibration(&self, run: &EquilibrationScript<'_>) -> String {
        let mut out = String::new();
        let _ = write_equilibration(&mut out, run);
        out
    }
}

fn write_script(out: &mut String, task: &TaskScript<'_>) -> std::fmt::Result {
    write_variables(out, task.md)?;
    writeln!(out, "variable        LAMBDA          equal {}", sci(task.lambda, 10))?;
    write_system(out, task.conf_file, task.copies, task.masses)?;
    writeln!(out, "# --------------------- FORCE FIELDS ---------------------")?;
    write_force_field(out, task)?;
    write_md_settings(out, task.md, &Observable::THERMO_KEYWORDS)?;
    writeln!(
        out,
        "thermo_modify   format {} %.16e",
        Observable::EnergyDerivative.column() + 1
    )?;
    write_ensemble_fix(out, task.md.ensemble)?;
    writeln!(out, "fix             mzero all momentum 10 linear 1 1 1")?;
    writeln!(out, "# --------------------- INITIALIZE -----------------------")?;
    writeln!(out, "velocity        all create ${{TEMP}} {}", task.velocity_seed)?;
    writeln!(out, "velocity        all zero linear")?;
    writeln!(out, "# --------------------- RUN ------------------------------")?;
    writeln!(out, "run             ${{NSTEPS}}")?;
    writeln!(out, "write_data      out.lmp")?;
    Ok(())
}

fn write_equilibration(out: &mut String, run: &EquilibrationScript<'_>) -> std::fmt::Result {
    write_variables(out, run.md)?;
    writeln!(out, "variable        DUMP_FREQ       equal {}", run.dump_freq)?;
    write_system(out, run.conf_file, None, run.masses)?;
    writeln!(out, "# --------------------- FORCE FIELDS ---------------------")?;
    writeln!(out, "pair_style      {} {}", MODEL_STYLE, run.model_file)?;
    writeln!(out, "pair_coeff      * *")?;
    // no coupling compute: the derivative column is absent
    let keywords = &Observable::THERMO_KEYWORDS[..Observable::EnergyDerivative.column()];
    write_md_settings(out, run.md, keywords)?;
    writeln!(
        out,
        "dump            1 all custom ${{DUMP_FREQ}} {} id type x y z vx vy vz",
        DUMP_FILE_NAME
    )?;
    write_ensemble_fix(out, run.md.ensemble)?;
    writeln!(out, "# --------------------- INITIALIZE -----------------------")?;
    writeln!(out, "velocity        all create ${{TEMP}} {}", run.velocity_seed)?;
    writeln!(out, "# --------------------- RUN ------------------------------")?;
    writeln!(out, "run             ${{NSTEPS}}")?;
    Ok(())
}

fn write_variables(out: &mut String, md: &MdSettings) -> std::fmt::Result {
    writeln!(out, "clear")?;
    writeln!(out, "# --------------------- VARIABLES-------------------------")?;
    writeln!(out, "variable        NSTEPS          equal {}", md.nsteps)?;
    writeln!(out, "variable        THERMO_FREQ     equal {}", md.stat_freq)?;
    writeln!(out, "variable        TEMP            equal {:.6}", md.temperature)?;
    writeln!(out, "variable        PRES            equal {:.6}", md.pressure)?;
    writeln!(out, "variable        TAU_T           equal {:.6}", md.tau_t)?;
    writeln!(out, "variable        TAU_P           equal {:.6}", md.tau_p)?;
    Ok(())
}

fn write_system(
    out: &mut String,
    conf_file: &str,
    copies: Option<[u32; 3]>,
    masses: &[f64],
) -> std::fmt::Result {
    writeln!(out, "# ---------------------- INITIALIZATION ------------------")?;
    writeln!(out, "units           metal")?;
    writeln!(out, "boundary        p p p")?;
    writeln!(out, "atom_style      atomic")?;
    writeln!(out, "# --------------------- ATOM DEFINITION ------------------")?;
    writeln!(out, "box             tilt large")?;
    writeln!(out, "read_data       {}", conf_file)?;
    if let Some([nx, ny, nz]) = copies {
        writeln!(out, "replicate       {} {} {}", nx, ny, nz)?;
    }
    writeln!(out, "change_box      all triclinic")?;
    for (i, mass) in masses.iter().enumerate() {
        writeln!(out, "mass            {} {:.6}", i + 1, mass)?;
    }
    Ok(())
}

fn write_md_settings(out: &mut String, md: &MdSettings, keywords: &[&str]) -> std::fmt::Result {
    writeln!(out, "# --------------------- MD SETTINGS ----------------------")?;
    writeln!(out, "neighbor        1.0 bin")?;
    writeln!(out, "timestep        {}", md.dt)?;
    writeln!(out, "thermo          ${{THERMO_FREQ}}")?;
    writeln!(out, "thermo_style    custom {}", keywords.join(" "))?;
    Ok(())
}

fn write_ensemble_fix(out: &mut String, ensemble: Ensemble) -> std::fmt::Result {
    match (ensemble, ensemble.barostat()) {
        (Ensemble::Nve, _) => writeln!(out, "fix             1 all nve"),
        (_, Some(barostat)) => writeln!(
            out,
            "fix             1 all npt temp ${{TEMP}} ${{TEMP}} ${{TAU_T}} {} ${{PRES}} ${{PRES}} ${{TAU_P}}",
            barostat
        ),
        (_, None) => writeln!(out, "fix             1 all nvt temp ${{TEMP}} ${{TEMP}} ${{TAU_T}}"),
    }
}

fn write_force_field(out: &mut String, task: &TaskScript<'_>) -> std::fmt::Result {
    let form = task.stage.potential_form();
    let soft = task.soft;

    if form.coupling == Coupling::Reverse {
        writeln!(out, "variable        INV_LAMBDA equal 1-${{LAMBDA}}")?;
    }
    writeln!(out, "variable        EPSILON equal {:.6}", soft.epsilon)?;
    match (form.coupled_term, form.coupling) {
        (CoupledTerm::Model, _) => writeln!(out, "variable        ONE equal 1")?,
        (CoupledTerm::SoftCore, Coupling::Reverse) => {
            writeln!(out, "variable        INV_EPSILON equal -${{EPSILON}}")?
        }
        (CoupledTerm::SoftCore, Coupling::Forward) => {}
    }

    let soft_args = format!("{:.6} {:.6} {:.6}", soft.n, soft.alpha_lj, soft.rcut);
    let pair_prefix = if form.includes_model {
        writeln!(
            out,
            "pair_style      hybrid/overlay {} {} {} {}",
            MODEL_STYLE, task.model_file, SOFT_STYLE, soft_args
        )?;
        writeln!(out, "pair_coeff      * * {}", MODEL_STYLE)?;
        format!("{} ", SOFT_STYLE)
    } else {
        writeln!(out, "pair_style      {} {}", SOFT_STYLE, soft_args)?;
        String::new()
    };

    for (i, j) in SoftCoreParams::type_pairs(soft.element_num) {
        let sigma = soft.sigma(i, j).unwrap_or_default();
        writeln!(
            out,
            "pair_coeff      {} {} {}${{EPSILON}} {:.6} {:.6}",
            i, j, pair_prefix, sigma, soft.activation
        )?;
    }

    let lambda_var = match form.coupling {
        Coupling::Forward => "v_LAMBDA",
        Coupling::Reverse => "v_INV_LAMBDA",
    };
    match form.coupled_term {
        CoupledTerm::SoftCore => {
            let delta_var = match form.coupling {
                Coupling::Forward => "v_EPSILON",
                Coupling::Reverse => "v_INV_EPSILON",
            };
            writeln!(
                out,
                "fix             tot_pot all adapt/fep 0 pair {} epsilon * * {} scale yes",
                SOFT_STYLE, lambda_var
            )?;
            writeln!(
                out,
                "compute         e_diff all fep ${{TEMP}} pair {} epsilon * * {}",
                SOFT_STYLE, delta_var
            )?;
        }
        CoupledTerm::Model => {
            writeln!(
                out,
                "fix             tot_pot all adapt/fep 0 pair {} scale * * {}",
                MODEL_STYLE, lambda_var
            )?;
            writeln!(
                out,
                "compute         e_diff all fep ${{TEMP}} pair {} scale * * v_ONE",
                MODEL_STYLE
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn soft() -> SoftCoreParams {
        let mut sigmas = BTreeMap::new();
        sigmas.insert("sigma_1_1".to_string(), 2.5);
        sigmas.insert("sigma_1_2".to_string(), 2.0);
        sigmas.insert("sigma_2_2".to_string(), 1.5);
        SoftCoreParams {
            n: 1.0,
            alpha_lj: 0.5,
            rcut: 6.0,
            epsilon: 0.02,
            activation: 0.5,
            element_num: 2,
            sigmas,
        }
    }

    fn md() -> MdSettings {
        MdSettings {
            nsteps: 1000,
            dt: 0.0005,
            stat_freq: 10,
            temperature: 300.0,
            pressure: 1.0,
            tau_t: 0.1,
            tau_p: 0.5,
            ensemble: Ensemble::Nvt,
        }
    }

    fn render(stage: Stage, lambda: f64) -> String {
        let soft = soft();
        let md = md();
        LammpsInput.render(&TaskScript {
            stage,
            lambda,
            conf_file: "../../conf.lmp",
            model_file: "../../graph.pb",
            masses: &[15.999, 1.008],
            copies: Some([2, 2, 2]),
            soft: &soft,
            md: &md,
            velocity_seed: 4242,
        })
    }

    #[test]
    fn soft_on_uses_soft_core_only() {
        let script = render(Stage::SoftOn, 0.25);
        assert!(script.contains("variable        LAMBDA          equal 2.5000000000e-01"));
        assert!(script.contains("pair_style      lj/cut/soft 1.000000 0.500000 6.000000"));
        assert!(!script.contains("deepmd"));
        assert!(script.contains("pair_coeff      1 2 ${EPSILON} 2.000000 0.500000"));
        assert!(script.contains("adapt/fep 0 pair lj/cut/soft epsilon * * v_LAMBDA scale yes"));
        assert!(script.contains("compute         e_diff all fep ${TEMP} pair lj/cut/soft epsilon * * v_EPSILON"));
    }

    #[test]
    fn deep_on_scales_model_over_soft_core() {
        let script = render(Stage::DeepOn, 0.5);
        assert!(script.contains("pair_style      hybrid/overlay deepmd ../../graph.pb lj/cut/soft"));
        assert!(script.contains("pair_coeff      * * deepmd"));
        assert!(script.contains("pair_coeff      2 2 lj/cut/soft ${EPSILON} 1.500000 0.500000"));
        assert!(script.contains("adapt/fep 0 pair deepmd scale * * v_LAMBDA"));
        assert!(script.contains("compute         e_diff all fep ${TEMP} pair deepmd scale * * v_ONE"));
    }

    #[test]
    fn soft_off_removes_soft_core_with_inverted_lambda() {
        let script = render(Stage::SoftOff, 1.0);
        assert!(script.contains("variable        INV_LAMBDA equal 1-${LAMBDA}"));
        assert!(script.contains("variable        INV_EPSILON equal -${EPSILON}"));
        assert!(script.contains("adapt/fep 0 pair lj/cut/soft epsilon * * v_INV_LAMBDA scale yes"));
        assert!(script.contains("pair lj/cut/soft epsilon * * v_INV_EPSILON"));
    }

    #[test]
    fn md_section_reflects_settings() {
        let script = render(Stage::SoftOn, 0.0);
        assert!(script.contains("read_data       ../../conf.lmp"));
        assert!(script.contains("replicate       2 2 2"));
        assert!(script.contains("mass            2 1.008000"));
        assert!(script.contains(
            "thermo_style    custom step ke pe etotal enthalpy temp press vol c_e_diff[1]"
        ));
        assert!(script.contains("fix             1 all nvt temp ${TEMP} ${TEMP} ${TAU_T}"));
        assert!(script.contains("velocity        all create ${TEMP} 4242"));
        assert!(script.trim_end().ends_with("write_data      out.lmp"));
    }

    #[test]
    fn barostat_follows_ensemble() {
        let soft = soft();
        for (ensemble, fix) in [
            (Ensemble::NptIso, "iso ${PRES} ${PRES} ${TAU_P}"),
            (Ensemble::NptAniso, "aniso ${PRES} ${PRES} ${TAU_P}"),
            (Ensemble::NptTri, "tri ${PRES} ${PRES} ${TAU_P}"),
        ] {
            let md = MdSettings { ensemble, ..md() };
            let script = LammpsInput.render(&TaskScript {
                stage: Stage::DeepOn,
                lambda: 0.5,
                conf_file: "../../conf.lmp",
                model_file: "../../graph.pb",
                masses: &[15.999, 1.008],
                copies: None,
                soft: &soft,
                md: &md,
                velocity_seed: 1,
            });
            assert!(script.contains(&format!(
                "fix             1 all npt temp ${{TEMP}} ${{TEMP}} ${{TAU_T}} {}",
                fix
            )));
        }
    }

    #[test]
    fn equilibration_runs_the_bare_model_and_dumps_frames() {
        let md = MdSettings {
            ensemble: Ensemble::NptTri,
            ..md()
        };
        let script = LammpsInput.render_equilibration(&EquilibrationScript {
            conf_file: "conf.lmp",
            model_file: "graph.pb",
            masses: &[15.999, 1.008],
            md: &md,
            dump_freq: 500,
            velocity_seed: 77,
        });
        assert!(script.contains("variable        DUMP_FREQ       equal 500"));
        assert!(script.contains("read_data       conf.lmp"));
        assert!(!script.contains("replicate"));
        assert!(script.contains("pair_style      deepmd graph.pb"));
        assert!(!script.contains("lj/cut/soft"));
        assert!(!script.contains("LAMBDA"));
        assert!(script.contains("thermo_style    custom step ke pe etotal enthalpy temp press vol\n"));
        assert!(script.contains(
            "dump            1 all custom ${DUMP_FREQ} dump.equi id type x y z vx vy vz"
        ));
        assert!(script.contains("tri ${PRES} ${PRES} ${TAU_P}"));
        assert!(script.contains("velocity        all create ${TEMP} 77"));
        assert!(script.trim_end().ends_with("run             ${NSTEPS}"));
    }
}
