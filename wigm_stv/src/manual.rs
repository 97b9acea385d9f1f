/*!

This is the long-form manual for `wigm_stv` and `ridingstv`.

## What is counted

A riding is made of one or more single-member districts that are merged into
one multi-member contest. It gets one seat per member district. Only the
first-preference results of each district are known, so ranked ballots are
made up before the count.

## Ballot synthesis

The only ballot method is `party-vote`. Every ballot ranks candidates of a
single party:

* the first choice is the candidate the vote was cast for, as many ballots as
  that candidate received votes,
* the later choices are the other candidates of the same party in the riding,
  in every possible order. Each order gets a share of the ballots in
  proportion to how well its candidates did in their own districts (their
  share of the valid votes there),
* independent candidates (party `Independent`, or no party) form a party of
  their own: their ballots have a single choice.

The shares are rounded down. What is left over after rounding goes to the
most likely order, so that every candidate starts the count with exactly the
votes they received.

## Counting

The count follows the Weighted Inclusive Gregory Method (WIGM) of the
Proportional Representation Foundation:

* the quota is the number of ballots divided by the number of seats plus one,
  truncated, plus the smallest unit kept by the count,
* a candidate reaching the quota is elected. Their surplus moves to the next
  choices on all their ballots, each ballot keeping a weight of
  `surplus / vote` of its current weight. The surpluses of the candidates
  elected together move one after the other, largest first. A candidate who
  reaches the quota through one of these transfers is only elected once
  they are all done, and still receives the later ones,
* when there is no surplus to move, the candidate with the fewest votes is
  defeated and their ballots move at full weight,
* ties go against the candidate with the lowest id. Ids follow the
  alphabetical order of surname, given name and party.

All the arithmetic is done with a fixed number of decimals (4 by default, at
most 9), truncating every result.

## Input formats

### Results

A CSV file with one line per candidate, and a header:

```text
district_id,district_name,total_ballots,rejected_ballots,surname,given_name,party,votes,vote_pct
10001,Avalon,40000,300,Smith,Ann,Red,20000,50.38
10001,Avalon,40000,300,Jones,Bo,Blue,19700,
```

The `vote_pct` column is optional. When it is missing or empty, the share is
computed from the valid ballots of the district (total minus rejected). A
given share must be a number, zero or more.

### Ridings

A CSV file with one line per riding. The districts are separated by `~`:

```text
riding,districts
Avalon-Bonavista,10001~10002
Labrador,10004
```

## Configuration

`ridingstv` can run on the data files alone:

```bash
ridingstv --results results.csv --ridings ridings.csv
```

A JSON configuration gives a name to the contest, sets the rules and the
colours of the parties:

```text
{
  "outputSettings": {
    "contestName": "Merged ridings",
    "contestDate": "2021-09-20",
    "contestJurisdiction": "Canada"
  },
  "resultsFile": "results.csv",
  "ridingsFile": "ridings.csv",
  "rules": {
    "ballotMethod": "party-vote",
    "countMethod": "wigm",
    "precision": 4
  },
  "parties": [
    { "name": "Red", "color": "#d71920" },
    { "name": "default", "color": "#777777" }
  ]
}
```

The data files are relative to the configuration file. The `--results`,
`--ridings` and `--precision` options override the configuration.

## Output

The summary is written in JSON, to the standard output or to the file given
with `--out`. For each riding, in the order of the ridings file, it lists the
quota, the winners in order of election, the party groups, the candidates
with their ids, and every step of the count. A riding that cannot be counted
has an `error` entry instead, and the program exits with an error once the
summary is written.

With `--reference`, the summary is compared to an earlier one and any
difference is printed.

 */
