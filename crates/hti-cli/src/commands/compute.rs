use crate::cli::ComputeArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use hti::core::free_energy::{FreeEnergyEstimate, FreeEnergyKind};
use hti::core::io::format::sci;
use hti::core::io::lammps_log::LammpsLogSource;
use hti::core::thermo::ThermoSummary;
use hti::engine::progress::ProgressReporter;
use hti::workflows;
use tracing::info;

pub fn run(args: ComputeArgs) -> Result<()> {
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_sink(progress_handler.sink());

    info!("Computing free energy of job {:?}", &args.job);
    let result = workflows::compute::run(&args.job, &LammpsLogSource, args.reference, &reporter)?;

    let kind = FreeEnergyKind::from(args.kind);
    print!("{}", format_thermo(&result.thermo));
    println!("# numb atoms: {}", result.natoms);
    println!("{}", free_energy_header(kind));
    println!("{}", format_free_energy(&result.free_energy(kind)));
    Ok(())
}

fn format_thermo(thermo: &ThermoSummary) -> String {
    let mut out = String::from("# thermodynamics (normalized by number of atoms)\n");
    for (label, unit, estimate) in thermo.entries() {
        out.push_str(&format!(
            "# {:<2} (err) {:>5}:  {:20.8} {:20.8}\n",
            label,
            format!("[{}]", unit),
            estimate.value,
            estimate.error
        ));
    }
    out
}

fn free_energy_header(kind: FreeEnergyKind) -> &'static str {
    match kind {
        FreeEnergyKind::Helmholtz => "# Helmholtz free energy per atom (err, sys err) [eV]:",
        FreeEnergyKind::Gibbs => "# Gibbs free energy per atom (err, sys err) [eV]:",
    }
}

fn format_free_energy(estimate: &FreeEnergyEstimate) -> String {
    format!(
        "{:20.12}  {:>10}  {:>10}",
        estimate.value,
        sci(estimate.statistical_error, 3),
        sci(estimate.systematic_error, 3)
    )
}
