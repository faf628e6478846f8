//! Static description of every configurable object, used by the `query` command.

/// One configurable parameter of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterInfo {
    pub name: &'static str,
    pub required: bool,
    /// Whether an estimate may address this parameter
    pub estimable: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectInfo {
    pub object_type: &'static str,
    pub sub_type: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ParameterInfo],
}

impl ObjectInfo {
    pub fn key(&self) -> String {
        if self.sub_type.is_empty() {
            self.object_type.to_string()
        } else {
            format!("{}.{}", self.object_type, self.sub_type)
        }
    }
}

const fn param(
    name: &'static str,
    required: bool,
    estimable: bool,
    description: &'static str,
) -> ParameterInfo {
    ParameterInfo {
        name,
        required,
        estimable,
        description,
    }
}

const LABEL: ParameterInfo = param("label", true, false, "Unique label of the object");

pub static CATALOGUE: &[ObjectInfo] = &[
    ObjectInfo {
        object_type: "model",
        sub_type: "",
        description: "Years, time steps and initialisation of the model",
        parameters: &[
            param("start_year", true, false, "First year of the model run"),
            param("final_year", true, false, "Last year of the model run"),
            param("time_steps", true, false, "Ordered time steps, each listing its processes"),
            param("initialisation", false, false, "Years to iterate before the first model year"),
            param("threads", false, false, "Worker threads used while fitting"),
        ],
    },
    ObjectInfo {
        object_type: "category",
        sub_type: "",
        description: "One row of the partition",
        parameters: &[
            param("name", true, false, "Category name"),
            param("min_age", true, false, "Youngest age"),
            param("max_age", true, false, "Oldest age, treated as a plus group"),
            param("initial_abundance", false, false, "Numbers at age at the start of each iteration"),
            param("mean_weight", false, false, "Mean weight at age, constant or per time step"),
        ],
    },
    ObjectInfo {
        object_type: "selectivity",
        sub_type: "constant",
        description: "The same value at every age",
        parameters: &[LABEL, param("c", true, true, "Selectivity value")],
    },
    ObjectInfo {
        object_type: "selectivity",
        sub_type: "logistic",
        description: "Logistic curve reaching alpha at older ages",
        parameters: &[
            LABEL,
            param("a50", true, true, "Age at 50% selectivity"),
            param("ato95", true, true, "Ages between 50% and 95% selectivity"),
            param("alpha", false, true, "Maximum selectivity"),
        ],
    },
    ObjectInfo {
        object_type: "selectivity",
        sub_type: "knife_edge",
        description: "Zero below age e and alpha from age e upwards",
        parameters: &[
            LABEL,
            param("e", true, true, "Age of full selection"),
            param("alpha", false, true, "Selectivity at and above e"),
        ],
    },
    ObjectInfo {
        object_type: "process",
        sub_type: "ageing",
        description: "Moves every age class up by one with a plus group",
        parameters: &[LABEL, param("categories", true, false, "Categories to age")],
    },
    ObjectInfo {
        object_type: "process",
        sub_type: "recruitment_constant",
        description: "Adds r0 recruits to the youngest age each year",
        parameters: &[
            LABEL,
            param("categories", true, false, "Categories receiving recruits"),
            param("proportions", true, true, "Share of r0 per category, summing to 1"),
            param("r0", true, true, "Recruits per year"),
        ],
    },
    ObjectInfo {
        object_type: "process",
        sub_type: "mortality_constant",
        description: "Constant natural mortality scaled by selectivity",
        parameters: &[
            LABEL,
            param("categories", true, false, "Categories to apply mortality to"),
            param("m", true, true, "Instantaneous mortality rate, one or one per category"),
            param("selectivities", true, false, "One selectivity per category"),
            param("time_step_ratio", false, false, "Share of the annual rate applied per execution"),
        ],
    },
    ObjectInfo {
        object_type: "process",
        sub_type: "maturation",
        description: "Moves a share of one category into another",
        parameters: &[
            LABEL,
            param("from", true, false, "Source category"),
            param("to", true, false, "Destination category"),
            param("rate", true, true, "Proportion moving each execution"),
            param("selectivity", true, false, "Selectivity applied to the rate"),
        ],
    },
    ObjectInfo {
        object_type: "process",
        sub_type: "mortality_event_biomass",
        description: "Removes a catch in biomass, capped by a maximum exploitation rate",
        parameters: &[
            LABEL,
            param("categories", true, false, "Categories fished"),
            param("selectivities", true, false, "One selectivity per category"),
            param("years", true, false, "Years with a catch"),
            param("catches", true, true, "Catch in biomass per year"),
            param("u_max", false, true, "Maximum exploitation rate, defaults to 0.99"),
            param("penalty", false, false, "Penalty triggered when the catch cannot be taken"),
        ],
    },
    ObjectInfo {
        object_type: "penalty",
        sub_type: "",
        description: "Score added when a process cannot do what it was asked",
        parameters: &[
            LABEL,
            param("multiplier", false, false, "Scale applied to the squared shortfall"),
            param("log_scale", false, false, "Compare requested and achieved values on log scale"),
        ],
    },
    ObjectInfo {
        object_type: "observation",
        sub_type: "biomass",
        description: "Relative biomass index with lognormal errors",
        parameters: &[
            LABEL,
            param("time_step", true, false, "Time step the observation is taken in"),
            param("categories", true, false, "Categories observed"),
            param("selectivities", true, false, "One selectivity per category"),
            param("q", false, true, "Catchability"),
            param("years", true, false, "Years observed"),
            param("obs", true, false, "Observed values"),
            param("error_values", true, false, "Coefficient of variation per year"),
        ],
    },
    ObjectInfo {
        object_type: "estimate",
        sub_type: "",
        description: "A parameter fitted by the minimiser or sampler",
        parameters: &[
            param("parameter", true, false, "Path such as process[label].r0 or process[label].catches{1990}"),
            param("label", false, false, "Defaults to the parameter path"),
            param("lower_bound", true, false, "Lower bound on the natural scale"),
            param("upper_bound", true, false, "Upper bound on the natural scale"),
            param("prior", false, false, "uniform, uniform_log, normal or lognormal"),
            param("transformation", false, false, "log, inverse, log_odds or square_root"),
        ],
    },
    ObjectInfo {
        object_type: "report",
        sub_type: "",
        description: "Output written by the report thread",
        parameters: &[
            LABEL,
            param("type", true, false, "Kind of report"),
            param("run_modes", false, false, "Run modes the report is written in"),
            param("model_state", false, false, "State that triggers the report"),
            param("time_step", false, false, "Time step that triggers the report"),
            param("years", false, false, "Years the time step trigger applies to"),
            param("file_name", false, false, "File to write instead of stdout"),
            param("write_mode", false, false, "overwrite, append or incremental_suffix"),
        ],
    },
    ObjectInfo {
        object_type: "minimiser",
        sub_type: "",
        description: "Differential evolution settings",
        parameters: &[
            param("population_size", false, false, "Members per generation, 0 picks 10 per estimate"),
            param("max_generations", false, false, "Generation limit"),
            param("crossover_probability", false, false, "Chance of taking the mutant value"),
            param("difference_scale", false, false, "Scale of the difference vector"),
            param("tolerance", false, false, "Relative spread that counts as converged"),
        ],
    },
    ObjectInfo {
        object_type: "mcmc",
        sub_type: "",
        description: "Random walk Metropolis settings",
        parameters: &[
            param("length", false, false, "Iterations to run"),
            param("keep", false, false, "Keep every nth iteration after burn in"),
            param("burn_in", false, false, "Iterations discarded at the start"),
            param("step_size", false, false, "Proposal scale, defaults to 2.4 / sqrt(n)"),
            param("max_correlation", false, false, "Limit on proposal correlations, in (0, 1]"),
            param("start_from_mpd", false, false, "Minimise before sampling"),
        ],
    },
];

/// Looks up `type` or `type.sub_type`. A bare type with several sub types
/// returns all of them.
pub fn describe(query: &str) -> Vec<&'static ObjectInfo> {
    let query = query.trim().to_ascii_lowercase();
    let (object_type, sub_type) = match query.split_once('.') {
        Some((t, s)) => (t.to_string(), Some(s.to_string())),
        None => (query.clone(), None),
    };

    CATALOGUE
        .iter()
        .filter(|info| info.object_type == object_type)
        .filter(|info| sub_type.as_deref().map_or(true, |s| info.sub_type == s))
        .collect()
}

pub fn object_types() -> Vec<&'static str> {
    let mut types: Vec<&'static str> = CATALOGUE.iter().map(|i| i.object_type).collect();
    types.dedup();
    types
}
